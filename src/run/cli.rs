use anyhow::{bail, Result};
use rust_decimal::Decimal;

use budgetline::db::Database;
use budgetline::models::Period;
use budgetline::sync::{Synchronizer, WriteVerb};

use super::{find_category, load_month, parse_amount, parse_kind, print_goals};

pub(crate) fn as_cli(args: &[String], db: Database, today: Period) -> Result<()> {
    let command = args.get(1).map_or("goals", String::as_str);
    let rest = args.get(2..).unwrap_or(&[]);
    match command {
        "goals" | "g" => cli_goals(rest, &db, today),
        "goal" | "set" => cli_set_goal(rest, db, today),
        "history" => cli_history(rest, &db, today),
        "category" | "cat" => cli_category(rest, db, today),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("budgetline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("BudgetLine — versioned monthly budget goals");
    println!();
    println!("Usage: budgetline [command]");
    println!();
    println!("Commands:");
    println!("  (none), goals [YYYY-MM]              Show goals for a month (default: current)");
    println!("  goal <category> <amount>             Set a category's goal");
    println!("    --month <YYYY-MM>                  Month to edit (default: current)");
    println!("  history <category>                   List every goal version of a category");
    println!("  category add <name> --type <t>       Create a subcategory (income|expenses)");
    println!("    --goal <amount>                    Initial goal (default: 0)");
    println!("  category rename <name> <new-name>    Rename a category");
    println!("  category move <name> <type>          Move a subcategory to income|expenses");
    println!("  category rm <name>                   Delete a subcategory and its history");
    println!("  category order <type> <a,b,...>      Reorder a type's subcategories");
    println!("  --help, -h                           Show this help");
    println!("  --version, -V                        Show version");
    println!();
    println!("Environment: BUDGETLINE_DB (database path), BUDGETLINE_LOG (log filter)");
}

/// Value following `flag`, e.g. `--month 2024-01`.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn month_arg(value: Option<&str>, today: Period) -> Result<Period> {
    match value {
        Some(m) => Ok(m.parse()?),
        None => Ok(today),
    }
}

fn cli_goals(args: &[String], db: &Database, today: Period) -> Result<()> {
    let month = month_arg(positional(args).first().copied(), today)?;
    let state = load_month(db, month, today)?;
    print_goals(&state);
    Ok(())
}

fn cli_set_goal(args: &[String], db: Database, today: Period) -> Result<()> {
    let (name, amount) = match positional(args)[..] {
        [name, amount] => (name, parse_amount(amount)?),
        _ => bail!("Usage: budgetline goal <category> <amount> [--month YYYY-MM]"),
    };
    let month = month_arg(flag_value(args, "--month"), today)?;

    let mut state = load_month(&db, month, today)?;
    let category = find_category(&state, name)?;
    let (id, label) = (category.id, category.name.clone());

    let mut sync = Synchronizer::new(db);
    let verb = sync.set_goal(&mut state, id, amount)?;
    match verb {
        WriteVerb::Create => println!("New goal version: {label} = ${amount:.2} from {month}"),
        WriteVerb::Overwrite => println!("Goal updated: {label} = ${amount:.2} for {month}"),
    }
    Ok(())
}

fn cli_history(args: &[String], db: &Database, today: Period) -> Result<()> {
    let name = match positional(args)[..] {
        [name] => name,
        _ => bail!("Usage: budgetline history <category>"),
    };
    let state = load_month(db, today, today)?;
    let category = find_category(&state, name)?;

    println!("{} ({})", category.name, category.kind);
    println!("{}", "─".repeat(32));
    for (i, record) in category.timeline.records().iter().enumerate() {
        let marker = if i == category.timeline.cursor() { "*" } else { " " };
        println!("{marker} {}  ${:>12.2}", record.period, record.amount);
    }
    Ok(())
}

fn cli_category(args: &[String], db: Database, today: Period) -> Result<()> {
    let Some(action) = args.first() else {
        bail!("Usage: budgetline category <add|rename|move|rm|order> ...");
    };
    let rest = &args[1..];
    let mut state = load_month(&db, today, today)?;
    let mut sync = Synchronizer::new(db);

    match (action.as_str(), &positional(rest)[..]) {
        ("add", [name]) => {
            let kind = match flag_value(rest, "--type") {
                Some(t) => parse_kind(t)?,
                None => bail!("Usage: budgetline category add <name> --type <income|expenses>"),
            };
            let goal = match flag_value(rest, "--goal") {
                Some(g) => parse_amount(g)?,
                None => Decimal::ZERO,
            };
            sync.add_subcategory(&mut state, name, kind, goal)?;
            println!("Created {kind} category: {name} (goal ${goal:.2} from {today})");
        }
        ("rename", [name, new_name]) => {
            let id = find_category(&state, name)?.id;
            sync.rename(&mut state, id, new_name)?;
            println!("Renamed {name} to {new_name}");
        }
        ("move", [name, kind]) => {
            let kind = parse_kind(kind)?;
            let id = find_category(&state, name)?.id;
            if sync.retype(&mut state, id, kind)? {
                println!("Moved {name} to {kind}");
            } else {
                println!("{name} is already a {kind} category");
            }
        }
        ("rm", [name]) => {
            let id = find_category(&state, name)?.id;
            let removed = sync.remove(&mut state, id)?;
            println!(
                "Deleted {} and {} goal version(s)",
                removed.name,
                removed.timeline.len()
            );
        }
        ("order", [kind, names]) => {
            let kind = parse_kind(kind)?;
            let ids = names
                .split(',')
                .map(|n| find_category(&state, n).map(|c| c.id))
                .collect::<Result<Vec<_>>>()?;
            sync.reorder(&mut state, kind, &ids)?;
            println!("Reordered {kind} categories");
        }
        _ => bail!("Usage: budgetline category <add|rename|move|rm|order> ... (see --help)"),
    }
    Ok(())
}
