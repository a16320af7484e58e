use std::error::Error;

pub struct ArgParser {
    iter: std::vec::IntoIter<String>,
    command_name: String,
}

impl ArgParser {
    pub fn new(args: Vec<String>, command_name: &str) -> Self {
        Self { iter: args.into_iter(), command_name: command_name.to_string() }
    }

    /// Extract a string value for a flag
    pub fn extract_value(&mut self, flag: &str) -> Result<String, Box<dyn Error>> {
        self.iter.next().ok_or_else(|| {
            format!("Provide a value after {} for {}", flag, self.command_name).into()
        })
    }

    /// Get next positional argument
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<String> {
        self.iter.next()
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }
}

/// Flags shared by the note commands. Each command rejects the ones it
/// has no use for.
#[derive(Default, Debug)]
pub struct CommonFlags {
    pub search: Option<String>,
    pub tags: Option<String>,
    pub render: bool,
    pub plain: bool,
    pub positional: Vec<String>,
}

impl CommonFlags {
    pub fn parse(args: Vec<String>, command_name: &str) -> Result<Self, Box<dyn Error>> {
        let mut parser = ArgParser::new(args, command_name);
        let mut flags = Self::default();
        while let Some(arg) = parser.next() {
            match arg.as_str() {
                "-s" | "--search" => flags.search = Some(parser.extract_value(&arg)?),
                "-t" | "--tags" => flags.tags = Some(parser.extract_value(&arg)?),
                "-r" | "--render" => flags.render = true,
                "--plain" => flags.plain = true,
                "--" => flags.positional.extend(parser.iter.by_ref()),
                other if other.starts_with('-') && other.len() > 1 => {
                    return Err(
                        format!("Unknown flag for {}: {other}", parser.command_name()).into()
                    );
                }
                _ => flags.positional.push(arg),
            }
        }
        Ok(flags)
    }

    /// First positional argument, with a usage error when missing.
    pub fn key(&self, usage: &str) -> Result<String, Box<dyn Error>> {
        self.positional.first().cloned().ok_or_else(|| format!("Usage: {usage}").into())
    }

    /// Positionals after the first, joined with spaces.
    pub fn rest_text(&self) -> String {
        self.positional.iter().skip(1).cloned().collect::<Vec<_>>().join(" ")
    }

    pub fn reject_search(&self, command: &str) -> Result<(), Box<dyn Error>> {
        if self.search.is_some() || self.tags.is_some() || self.render {
            return Err(format!("{command} takes no -s/-t/--render flags").into());
        }
        Ok(())
    }
}

/// Parse a 1-based number argument.
pub fn parse_number(text: &str, what: &str) -> Result<usize, Box<dyn Error>> {
    match text.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("Invalid {what}: {text}").into()),
    }
}
