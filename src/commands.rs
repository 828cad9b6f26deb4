//! Available commands and autocomplete logic

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "agents",
    aliases: &["a", "agent"],
    description: "List agents",
  },
  Command {
    name: "workflows",
    aliases: &["w", "workflow", "flows"],
    description: "List workflows",
  },
  Command {
    name: "products",
    aliases: &["p", "product"],
    description: "List products",
  },
  Command {
    name: "me",
    aliases: &["whoami", "user"],
    description: "Show the signed-in user",
  },
  Command {
    name: "refresh",
    aliases: &["r", "refetch"],
    description: "Refetch every list and report failures",
  },
];

/// Resolve a command by exact name or alias.
pub fn resolve(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| matches!(match_rank(cmd, &input), Some(0 | 1)))
}

/// Commands matching `input`, best match first. Empty input lists everything.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input).map(|rank| (rank, cmd)))
    .collect();
  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}

/// Lower is better: exact, then prefix, then substring. An alias hit ranks
/// just below the same kind of hit on the name.
fn match_rank(cmd: &Command, input: &str) -> Option<u8> {
  std::iter::once(cmd.name)
    .chain(cmd.aliases.iter().copied())
    .enumerate()
    .filter_map(|(i, word)| {
      let rank = if word == input {
        0
      } else if word.starts_with(input) {
        2
      } else if word.contains(input) {
        4
      } else {
        return None;
      };
      Some(rank + u8::from(i > 0))
    })
    .min()
}
