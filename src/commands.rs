//! Available commands and autocomplete logic

use crate::api::{EntityKind, ViewScope};

/// What running a command does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
  /// Switch the browser to a collection
  Browse(EntityKind),
  /// Set the scope of the current collection
  Scope(ViewScope),
  /// Create a record in the current collection from the argument
  Create,
  /// Upload the file at the argument path into the selected matter
  Upload,
  /// Refetch the current collection, ignoring freshness
  Refresh,
  /// Drop every cached collection and start a new session
  Logout,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: CommandAction,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "clients",
    aliases: &["c", "client"],
    description: "Browse clients",
    action: CommandAction::Browse(EntityKind::Client),
  },
  Command {
    name: "matters",
    aliases: &["m", "matter"],
    description: "Browse matters",
    action: CommandAction::Browse(EntityKind::Matter),
  },
  Command {
    name: "time",
    aliases: &["t", "time-entries", "timesheet"],
    description: "Browse time entries",
    action: CommandAction::Browse(EntityKind::TimeEntry),
  },
  Command {
    name: "invoices",
    aliases: &["inv", "invoice", "billing"],
    description: "Browse invoices",
    action: CommandAction::Browse(EntityKind::Invoice),
  },
  Command {
    name: "events",
    aliases: &["e", "calendar", "cal"],
    description: "Browse calendar events",
    action: CommandAction::Browse(EntityKind::Event),
  },
  Command {
    name: "documents",
    aliases: &["d", "docs", "document"],
    description: "Browse documents",
    action: CommandAction::Browse(EntityKind::Document),
  },
  Command {
    name: "keys",
    aliases: &["k", "api-keys", "apikeys"],
    description: "Browse API keys",
    action: CommandAction::Browse(EntityKind::ApiKey),
  },
  Command {
    name: "groups",
    aliases: &["g", "group"],
    description: "Browse user groups",
    action: CommandAction::Browse(EntityKind::Group),
  },
  Command {
    name: "types",
    aliases: &["matter-types", "mt"],
    description: "Browse matter types",
    action: CommandAction::Browse(EntityKind::MatterType),
  },
  Command {
    name: "mine",
    aliases: &["my"],
    description: "Show only my records",
    action: CommandAction::Scope(ViewScope::My),
  },
  Command {
    name: "all",
    aliases: &["a", "everyone"],
    description: "Show records across the firm",
    action: CommandAction::Scope(ViewScope::All),
  },
  Command {
    name: "new",
    aliases: &["n", "create", "add"],
    description: "Create a record: new <name>",
    action: CommandAction::Create,
  },
  Command {
    name: "upload",
    aliases: &["u", "attach"],
    description: "Upload into selected matter: upload <path>",
    action: CommandAction::Upload,
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Refetch the current collection",
    action: CommandAction::Refresh,
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "Clear the cache and start over",
    action: CommandAction::Logout,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit caseload",
    action: CommandAction::Quit,
  },
];

/// Split input into the command word and its trimmed argument, if any
pub fn split_input(input: &str) -> (&str, Option<&str>) {
  let input = input.trim();
  match input.split_once(char::is_whitespace) {
    Some((word, rest)) => {
      let rest = rest.trim();
      (word, (!rest.is_empty()).then_some(rest))
    }
    None => (input, None),
  }
}

/// Get autocomplete suggestions for the command word of the input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = split_input(input).0.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    let priority = if cmd.name == input_lower {
      0
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      1
    } else if cmd.name.starts_with(&input_lower) {
      2
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      3
    } else if cmd.name.contains(&input_lower) {
      4
    } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      5
    } else {
      continue;
    };
    matches.push((cmd, priority));
  }

  // Stable sort keeps declaration order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve typed input to a command, preferring the highlighted suggestion.
pub fn resolve(input: &str, selected_suggestion: usize) -> Option<&'static Command> {
  get_suggestions(input).get(selected_suggestion).copied()
}
