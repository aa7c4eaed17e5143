//! App-mention command parsing.

/// Command recognized inside an app mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionCommand {
    Leaderboard,
}

/// Parses mention text of the form `<@bot> leaderboard`.
///
/// The keyword is case-insensitive and surrounding whitespace is tolerated;
/// anything else is not a command and the mention is ignored.
pub fn parse_mention_command(text: &str) -> Option<MentionCommand> {
    let rest = strip_leading_mention(text.trim())?;
    if rest.trim().eq_ignore_ascii_case("leaderboard") {
        return Some(MentionCommand::Leaderboard);
    }
    None
}

fn strip_leading_mention(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("<@")?;
    let (mention, remainder) = rest.split_once('>')?;
    if mention.is_empty() {
        return None;
    }
    Some(remainder)
}
