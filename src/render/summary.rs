//! Result summarization through `SNOWFLAKE.CORTEX.COMPLETE`.

use crate::warehouse::Table;

const SUMMARY_PROMPT: &str = "Summarize results, Show trends & Itemize top insights & trends \
    from the following json data in less than 150 words. Data: ";

/// Builds the statement that asks the warehouse LLM to summarize `sql`'s result.
pub fn summary_sql(sql: &str, model: &str) -> String {
    let inner = sql.replace(';', "");
    format!(
        "SELECT SNOWFLAKE.CORTEX.COMPLETE('{}', '{}' || \
         (SELECT array_agg(object_construct(*))::string as Output from ({}))) as Insights",
        escape_literal(model),
        escape_literal(SUMMARY_PROMPT),
        inner.trim()
    )
}

/// The summary text: first cell of the first row, if not NULL.
pub fn extract_summary(table: &Table) -> Option<String> {
    table
        .rows
        .first()
        .and_then(|row| row.first())
        .filter(|value| !value.is_null())
        .map(|value| value.to_display_string().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}
