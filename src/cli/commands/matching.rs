//! Match command implementations.
//!
//! A negative answer exits with the `NOT_SAME` code so scripts can branch on
//! the exit status alone.

use colored::Colorize;
use serde::Serialize;

use crate::cli::MatchCommands;
use crate::error::{Error, Result};
use crate::matcher::{is_same_location_name, is_same_route};
use crate::model::{Line, Mode, Route};

#[derive(Serialize)]
struct MatchOutput<'a> {
    lhs: &'a str,
    rhs: &'a str,
    same: bool,
}

/// Execute match commands.
pub fn execute(command: &MatchCommands, json: bool) -> Result<()> {
    match command {
        MatchCommands::Location { lhs, rhs } => {
            let same = is_same_location_name(lhs, rhs);
            report("locations", lhs, rhs, same, json)
        }
        MatchCommands::Route {
            line,
            route_name,
            line_name,
            line_number,
        } => {
            if line_name.is_empty() && line_number.is_empty() {
                return Err(Error::InvalidArgument(
                    "route matching needs --line-name or --line-number".into(),
                ));
            }
            let route = Route {
                name: route_name.clone().unwrap_or_default(),
                ..Route::new(Line::new(line.as_str(), Mode::Unknown), "")
            };
            let booked = format!("{line_name} {line_number}");
            let same = is_same_route(&route, line_name, line_number);
            report("routes", line, booked.trim(), same, json)
        }
    }
}

fn report(what: &str, lhs: &str, rhs: &str, same: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&MatchOutput { lhs, rhs, same })?);
    } else if same {
        println!("{} \"{lhs}\" and \"{rhs}\" are the same", "✓".green());
    } else {
        println!("{} \"{lhs}\" and \"{rhs}\" differ", "✗".red());
    }

    if same {
        Ok(())
    } else {
        Err(Error::NotSame { what: what.to_string() })
    }
}
