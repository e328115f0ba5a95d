#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "top",
        action: "add_tops",
    },
    CommandSpec {
        command: "bottom",
        action: "add_bottoms",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "shoe",
    action: "set_accessory_image",
}];

pub(crate) const RAW_TEXT_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "shoe_text",
    action: "set_accessory_text",
}];

pub(crate) const ID_LIST_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "shot",
    action: "toggle_shots",
}];

pub(crate) const CATEGORY_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "remove",
        action: "remove_image",
    },
    CommandSpec {
        command: "clear",
        action: "clear_images",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "shots",
        action: "list_shots",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "auth",
        action: "authorize",
    },
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/top <path...>",
    "/bottom <path...>",
    "/shoe <path>",
    "/shoe_text <description>",
    "/remove <top|bottom|shoe> <index>",
    "/clear <top|bottom|shoe>",
    "/shot <id...>",
    "/shots",
    "/status",
    "/auth",
    "/generate",
    "/help",
    "/quit",
];
