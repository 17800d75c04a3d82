//! Line commands accepted by the interactive `browse` loop.

use std::str::FromStr;

use review_client::{QueryChange, QueryController};
use shared::domain::SearchField;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Field(SearchField),
    Term(String),
    Tag(String),
    Clear,
    Next,
    Prev,
    First,
    Last,
    Page(u32),
    Refresh,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  field <keyword|file_name|patient_id>   choose the search field
  term [text]                            set the search term (empty clears it)
  tag <keyword>                          filter by a keyword tag
  clear                                  drop every filter
  next | prev | first | last             move between pages
  page <n>                               jump to page n
  refresh                                re-run the current query
  quit                                   leave browse";

impl FromStr for BrowseCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "field" => Self::Field(rest.parse().map_err(|err| format!("{err}"))?),
            "term" | "search" => Self::Term(rest.to_string()),
            "tag" if !rest.is_empty() => Self::Tag(rest.to_string()),
            "tag" => return Err("tag needs a keyword".into()),
            "clear" => Self::Clear,
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "first" => Self::First,
            "last" => Self::Last,
            "page" => Self::Page(
                rest.parse()
                    .map_err(|_| format!("page needs a positive number, got '{rest}'"))?,
            ),
            "refresh" | "r" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            "" => return Err("empty command".into()),
            other => return Err(format!("unknown command '{other}'; type 'help'")),
        };
        Ok(command)
    }
}

impl BrowseCommand {
    /// Applies a query mutation. `None` for commands that don't touch the query.
    pub fn apply(&self, controller: &mut QueryController) -> Option<QueryChange> {
        let change = match self {
            Self::Field(field) => controller.set_search_field(*field),
            Self::Term(term) => controller.set_search_term(term.clone()),
            Self::Tag(tag) => controller.click_tag(tag),
            Self::Clear => controller.clear_filter(),
            Self::Next => controller.next_page(),
            Self::Prev => controller.previous_page(),
            Self::First => controller.first_page(),
            Self::Last => controller.last_page(),
            Self::Page(page) => controller.set_page(*page),
            Self::Refresh | Self::Help | Self::Quit => return None,
        };
        Some(change)
    }
}
