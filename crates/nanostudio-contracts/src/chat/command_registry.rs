#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is a single setting value.
pub(crate) const SETTING_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
    },
    CommandSpec {
        command: "ratio",
        action: "set_aspect_ratio",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        action: "set_image",
    },
    CommandSpec {
        command: "upload",
        action: "set_image",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate_current",
    },
    CommandSpec {
        command: "optimize",
        action: "optimize",
    },
    CommandSpec {
        command: "clear_image",
        action: "clear_image",
    },
    CommandSpec {
        command: "library",
        action: "show_library",
    },
    CommandSpec {
        command: "gallery",
        action: "show_gallery",
    },
    CommandSpec {
        command: "status",
        action: "show_status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const PROMPT_COMMAND: CommandSpec = CommandSpec {
    command: "prompt",
    action: "set_prompt",
};

pub(crate) const PICK_COMMAND: CommandSpec = CommandSpec {
    command: "pick",
    action: "pick_library",
};

pub(crate) const DOWNLOAD_COMMAND: CommandSpec = CommandSpec {
    command: "download",
    action: "download",
};

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/mode",
    "/ratio",
    "/prompt",
    "/generate",
    "/optimize",
    "/image",
    "/clear_image",
    "/library",
    "/pick",
    "/gallery",
    "/download",
    "/status",
    "/quit",
];
