//! Vocabularies used by the injection detector and the clause tokenizer.
//!
//! All lists are lowercase; matching is case-insensitive.

/// Character sequences that never appear in a legitimate filter value.
pub const INJECTION_SYMBOLS: &[&str] = &[";", "--", "/*", "*/", "#", "@@", "@", "'", "\"", "`", "||"];

/// Statement keywords that indicate an attempt to run a second command.
pub const INJECTION_COMMANDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "create", "alter", "table", "union", "join",
    "where",
];

/// MySQL reserved words.
pub const RISKY_KEYWORDS: &[&str] = &[
    "add", "all", "alter", "analyze", "and", "as", "asc", "asensitive", "before", "between",
    "bigint", "binary", "blob", "both", "by", "call", "cascade", "case", "change", "char",
    "character", "check", "collate", "column", "condition", "constraint", "continue",
    "convert", "create", "cross", "current_date", "current_time", "current_timestamp",
    "cursor", "database", "databases", "day_hour", "day_microsecond", "day_minute",
    "day_second", "dec", "decimal", "declare", "default", "delayed", "delete", "desc",
    "describe", "deterministic", "distinct", "distinctrow", "div", "double", "drop",
    "dual", "each", "else", "elseif", "enclosed", "escaped", "exists", "exit", "explain",
    "false", "fetch", "float", "for", "force", "foreign", "from", "fulltext", "general",
    "grant", "group", "having", "high_priority", "hour_microsecond", "hour_minute",
    "hour_second", "if", "ignore", "in", "index", "infile", "inner", "inout",
    "insensitive", "insert", "int", "integer", "interval", "into", "is", "iterate", "join",
    "key", "keys", "kill", "leading", "leave", "left", "like", "limit", "linear", "lines",
    "load", "localtime", "localtimestamp", "lock", "long", "longblob", "longtext", "loop",
    "low_priority", "master_ssl_verify_server_cert", "match", "maxvalue", "mediumblob",
    "mediumint", "mediumtext", "middleint", "minute_microsecond", "minute_second", "mod",
    "modifies", "natural", "not", "no_write_to_binlog", "null", "numeric", "on", "optimize",
    "option", "optionally", "or", "order", "out", "outer", "outfile", "precision", "primary",
    "procedure", "purge", "range", "read", "reads", "read_write", "real", "references",
    "regexp", "release", "rename", "repeat", "replace", "require", "resignal", "restrict",
    "return", "revoke", "right", "rlike", "schema", "schemas", "second_microsecond",
    "select", "sensitive", "separator", "set", "show", "signal", "smallint", "spatial",
    "specific", "sql", "sqlexception", "sqlstate", "sqlwarning", "sql_big_result",
    "sql_calc_found_rows", "sql_small_result", "ssl", "starting", "stored", "straight_join",
    "table", "terminated", "then", "tinyblob", "tinyint", "tinytext", "to", "trailing",
    "trigger", "true", "undo", "union", "unique", "unlock", "unsigned", "update", "usage",
    "use", "using", "utc_date", "utc_time", "utc_timestamp", "values", "varbinary",
    "varchar", "varcharacter", "varying", "virtual", "when", "where", "while", "with",
    "write", "xor", "year_month", "zerofill",
];

/// Boolean connectives and predicate words.
pub const LOGIC_GATES: &[&str] = &[
    "and", "or", "not", "xor", "between", "in", "is", "like", "regexp", "rlike", "null", "true",
    "false", "exists", "distinct", "limit", "having", "join", "union", "current_date",
    "current_time", "current_timestamp", "utc_date", "utc_time", "utc_timestamp", "mod", "if",
];

/// Phrases that contain keywords but are harmless on their own.
pub const SAFE_PHRASES: &[&str] = &[r"order\s?by\s?(asc|desc)?", r"selective", r"unionized"];

/// Tokens a `WHERE` fragment may contain without further inspection.
pub const SAFE_CLAUSE_TOKENS: &[&str] = &[
    "(", ")", ",", "or", "and", "=", "!=", "<>", "<", ">", "<=", ">=", "like", "in", "not", "is",
    "null", "true", "false",
];

/// Statements a trigger body must never contain.
pub const RISKY_TRIGGER_STATEMENTS: &[&str] = &[
    "drop", "alter", "truncate", "create database", "use", "grant", "revoke", "load data",
    "outfile", "infile",
];

/// Schemas a trigger may never target.
pub const SYSTEM_SCHEMAS: &[&str] = &["mysql", "information_schema", "performance_schema", "sys"];

pub fn is_risky_keyword(word: &str) -> bool {
    contains_ci(RISKY_KEYWORDS, word)
}

pub fn is_logic_gate(word: &str) -> bool {
    contains_ci(LOGIC_GATES, word)
}

pub fn is_safe_clause_token(token: &str) -> bool {
    contains_ci(SAFE_CLAUSE_TOKENS, token)
}

/// Reserved word that is not a boolean connective: must be quoted when
/// used as a column name.
pub fn needs_escaping(column: &str) -> bool {
    is_risky_keyword(column) && !is_logic_gate(column)
}

fn contains_ci(list: &[&str], word: &str) -> bool {
    list.iter().any(|k| k.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        assert!(is_risky_keyword("ORDER"));
        assert!(is_logic_gate("Between"));
        assert!(is_safe_clause_token("LIKE"));
        assert!(!is_risky_keyword("order_id"));
    }

    #[test]
    fn reserved_columns_need_escaping_but_connectives_do_not() {
        assert!(needs_escaping("key"));
        assert!(needs_escaping("desc"));
        assert!(!needs_escaping("and"));
        assert!(!needs_escaping("status"));
    }
}
