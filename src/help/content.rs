use super::{HelpBook, HelpFlag, HelpTopic, Section};

pub(crate) fn book() -> HelpBook<'static> {
    HelpBook {
        title: "nvnotes: search-as-you-type notes",
        usage: "nvnotes <command> [options]   (also installed as `nv`)",
        topics: ALL_TOPICS,
        footer: &[
            "Use `nvnotes help <topic>` for details, e.g. `nvnotes help browse`.",
            "Keys are shown in the last column of `list`; any command taking <key> accepts them.",
        ],
    }
}

const SEARCH_FLAG: HelpFlag<'static> = HelpFlag {
    name: "-s, --search <text>",
    desc: "Filter with the configured search mode (gstyle or regexp).",
};

const ALL_TOPICS: &[HelpTopic<'static>] = &[
    HelpTopic {
        name: "list",
        summary: "List notes in database order with pinned notes first.",
        usage: "nvnotes list [-s text]",
        details: &[
            "gstyle searches take words, \"quoted phrases\" and tag:prefix filters; every one must match.",
            "regexp searches treat the whole text as one regular expression; an invalid expression lists everything.",
        ],
        flags: &[SEARCH_FLAG],
        aliases: &["ls"],
        section: Section::Command,
        examples: &["nvnotes list -s 'tag:work \"status report\"'"],
    },
    HelpTopic {
        name: "show",
        summary: "Print one note with search matches highlighted and links numbered.",
        usage: "nvnotes show <key> [-s text] [--render] [--plain]",
        details: &[
            "Links are printed with their number, e.g. https://example.com[1], for use with `follow`.",
            "A key that is unknown or deleted prints \"Nothing to display.\"",
        ],
        flags: &[
            SEARCH_FLAG,
            HelpFlag { name: "-r, --render", desc: "Render the note as Markdown." },
            HelpFlag { name: "--plain", desc: "Disable colors." },
        ],
        aliases: &["view"],
        section: Section::Command,
        examples: &["nvnotes show 1a2B3c -s milk"],
    },
    HelpTopic {
        name: "links",
        summary: "List the links in a note with their numbers.",
        usage: "nvnotes links <key>",
        details: &["Bare URLs and [[Note Title]] references are both links."],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &["nvnotes links 1a2B3c"],
    },
    HelpTopic {
        name: "follow",
        summary: "Open link <n> of a note: URLs in the browser, [[references]] in the terminal.",
        usage: "nvnotes follow <key> <n>",
        details: &[
            "URLs go to $BROWSER, or the platform opener when it is unset.",
            "[[Title]] references open the note whose first line is Title.",
        ],
        flags: &[],
        aliases: &["open"],
        section: Section::Command,
        examples: &["nvnotes follow 1a2B3c 2"],
    },
    HelpTopic {
        name: "new",
        summary: "Create a note; the first line is its title.",
        usage: "nvnotes new <text...> [-t tags]",
        details: &["Words are joined with spaces. Use \\n in the shell (e.g. $'Title\\nbody') for a body."],
        flags: &[HelpFlag {
            name: "-t, --tags <a,b>",
            desc: "Comma-separated tags; whitespace and markup characters are removed.",
        }],
        aliases: &["add"],
        section: Section::Command,
        examples: &["nvnotes new Groceries -t home,errands"],
    },
    HelpTopic {
        name: "append",
        summary: "Append a line to an existing note.",
        usage: "nvnotes append <key> <text...>",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &["nvnotes append 1a2B3c eggs"],
    },
    HelpTopic {
        name: "tag",
        summary: "Replace a note's tags.",
        usage: "nvnotes tag <key> <tags>",
        details: &["Pass an empty string to remove every tag."],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &["nvnotes tag 1a2B3c 'work, urgent'"],
    },
    HelpTopic {
        name: "pin",
        summary: "Pin a note so it sorts to the top.",
        usage: "nvnotes pin <key>",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "unpin",
        summary: "Remove the pin from a note.",
        usage: "nvnotes unpin <key>",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "delete",
        summary: "Mark a note deleted; it disappears from lists and searches.",
        usage: "nvnotes delete <key>",
        details: &["The JSON document stays on disk with its deleted flag set."],
        flags: &[],
        aliases: &["rm"],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "browse",
        summary: "Interactive session: search, select, follow links, pin and tag.",
        usage: "nvnotes browse [-s text] [--plain]",
        details: &[
            "Reads one command per line: text searches, a row number selects, `o N` follows link N,",
            "`p` toggles the pin, `t tags` sets tags, `/text` searches for text that looks like a command, `q` quits.",
        ],
        flags: &[SEARCH_FLAG, HelpFlag { name: "--plain", desc: "Disable colors." }],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "status",
        summary: "Show note counts and pending save/sync work.",
        usage: "nvnotes status",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "config",
        summary: "Show the effective configuration and which files were read.",
        usage: "nvnotes config",
        details: &[
            "Files are read in order, later ones overriding earlier: <app dir>/nvnotes.cfg, ~/nvnotes.cfg,",
            "~/.nvnotes.cfg, ~/.nvnotes, ~/.nvnotesrc, then $NVNOTES_CONFIG. Settings live in an [nvnotes] section.",
        ],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "path",
        summary: "Print the note database directory.",
        usage: "nvnotes path",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "help",
        summary: "Show this overview or the page for one command.",
        usage: "nvnotes help [topic]",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Command,
        examples: &[],
    },
    HelpTopic {
        name: "NVNOTES_CONFIG",
        summary: "Extra config file read after the standard ones.",
        usage: "NVNOTES_CONFIG=/path/to/file",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Environment,
        examples: &[],
    },
    HelpTopic {
        name: "NO_COLOR",
        summary: "Disable colored output.",
        usage: "NO_COLOR=1",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Environment,
        examples: &[],
    },
    HelpTopic {
        name: "RUST_LOG",
        summary: "Log filter for nvnotes.log in the database directory (default debug).",
        usage: "RUST_LOG=info",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Environment,
        examples: &[],
    },
    HelpTopic {
        name: "BROWSER",
        summary: "Program used to open URLs from `follow`.",
        usage: "BROWSER=firefox",
        details: &[],
        flags: &[],
        aliases: &[],
        section: Section::Environment,
        examples: &[],
    },
];
