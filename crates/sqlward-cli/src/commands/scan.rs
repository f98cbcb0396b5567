//! `sqlward scan`: run the injection detector over a piece of text.

use anyhow::Result;
use clap::ValueEnum;
use sqlward_sanitize::{InjectionDetector, InjectionVerdict, PatternFamilies};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    Symbols,
    Keywords,
    LogicGates,
    All,
}

impl From<FamilyArg> for PatternFamilies {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Symbols => PatternFamilies::SYMBOLS,
            FamilyArg::Keywords => PatternFamilies::KEYWORDS,
            FamilyArg::LogicGates => PatternFamilies::LOGIC_GATES,
            FamilyArg::All => PatternFamilies::ALL,
        }
    }
}

pub fn families(args: &[FamilyArg]) -> PatternFamilies {
    args.iter()
        .copied()
        .map(PatternFamilies::from)
        .fold(PatternFamilies::NONE, |acc, f| acc | f)
}

pub fn inspect(text: &str, args: &[FamilyArg]) -> InjectionVerdict {
    InjectionDetector::new().inspect(text, families(args))
}

/// Print the verdict. Returns whether the text was flagged.
pub fn run(text: &str, args: &[FamilyArg], json: bool) -> Result<bool> {
    let verdict = inspect(text, args);

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        return Ok(verdict.flagged);
    }

    match (&verdict.category, &verdict.matched_pattern) {
        (Some(category), Some(matched)) => {
            println!("✗ flagged ({:?}): matched {:?}", category, matched)
        }
        (Some(category), None) => println!("✗ flagged ({:?})", category),
        _ => println!("✔ clean"),
    }
    Ok(verdict.flagged)
}
