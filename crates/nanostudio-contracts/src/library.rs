#[derive(Debug, Clone, Copy)]
pub struct PromptCategory {
    pub category: &'static str,
    pub items: &'static [&'static str],
}

pub const PROMPT_LIBRARY: &[PromptCategory] = &[
    PromptCategory {
        category: "Photography",
        items: &[
            "A cinematic shot of a rainy street in Tokyo at night, neon lights reflecting on puddles, shot on 35mm lens, f/1.8, high contrast, realistic texture, 8k resolution.",
            "Portrait of an elderly fisherman with a weathered face, natural lighting, intricate details, depth of field, National Geographic style.",
            "Macro photography of a dew drop on a spider web, morning light, bokeh background, sharp focus, vibrant colors.",
        ],
    },
    PromptCategory {
        category: "Digital Art & Fantasy",
        items: &[
            "A cyberpunk samurai standing on a rooftop, futuristic city background, vibrant neon colors, glitch effect, detailed armor, digital painting style.",
            "A whimsical forest house inside a giant mushroom, fairy lights, magical atmosphere, soft pastel colors, ghibli studio style.",
            "An isometric view of a futuristic space station, low poly style, soft lighting, pastel color palette, highly detailed.",
        ],
    },
    PromptCategory {
        category: "3D & Texture",
        items: &[
            "A fluffy cute monster made of wool felt, stop motion style, studio lighting, soft shadows, 3d render, blender cycles.",
            "A futuristic car made of translucent glass and gold, studio lighting, subsurface scattering, octane render, 4k.",
            "Delicious looking gourmet burger with melting cheese, steam rising, professional food photography, 8k, highly detailed texture.",
        ],
    },
];

/// Every library prompt in display order, numbered from 1.
pub fn numbered_prompts() -> impl Iterator<Item = (usize, &'static str, &'static str)> {
    PROMPT_LIBRARY
        .iter()
        .flat_map(|category| {
            category
                .items
                .iter()
                .map(move |item| (category.category, *item))
        })
        .enumerate()
        .map(|(idx, (category, item))| (idx + 1, category, item))
}

pub fn prompt_by_number(number: usize) -> Option<&'static str> {
    numbered_prompts()
        .find(|(idx, _, _)| *idx == number)
        .map(|(_, _, item)| item)
}
