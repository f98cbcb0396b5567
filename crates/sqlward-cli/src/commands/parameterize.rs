//! `sqlward parameterize`: show how WHERE fragments are rewritten.

use anyhow::{Context, Result};
use sqlward_core::Filter;
use sqlward_sanitize::{ParameterizedClause, Parameterizer};

pub fn parameterize(fragments: &[String]) -> Result<ParameterizedClause> {
    let filter = match fragments {
        [single] => Filter::Clause(single.clone()),
        many => Filter::Fragments(many.to_vec()),
    };
    Parameterizer::default()
        .parameterize(&filter)
        .context("Clause rejected")
}

pub fn run(fragments: &[String], inline: bool, json: bool) -> Result<()> {
    let clause = parameterize(fragments)?;

    if json {
        let mut out = serde_json::to_value(&clause)?;
        if inline {
            out["inline"] = serde_json::Value::String(clause.render_inline());
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", clause.text);
    for (i, param) in clause.params.iter().enumerate() {
        println!("  ?{} = {}", i + 1, serde_json::to_string(param)?);
    }
    if inline {
        println!("{}", clause.render_inline());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_match_params() {
        let clause = parameterize(&["name = 'ada'".to_string(), "age > 30".to_string()]).unwrap();
        assert_eq!(clause.placeholder_count(), clause.params.len());
        assert!(!clause.params.is_empty());
    }

    #[test]
    fn test_rejects_injection() {
        assert!(parameterize(&["1=1 OR 1=1; --".to_string()]).is_err());
    }
}
