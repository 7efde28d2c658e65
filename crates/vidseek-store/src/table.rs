//! LanceDB connection helpers and predicate building.
use anyhow::Result;
use lancedb::{connect, Connection};

use vidseek_core::types::DocumentFilter;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub fn quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

/// SQL predicate for a document filter; `None` when the filter is empty.
pub fn filter_predicate(filter: &DocumentFilter) -> Option<String> {
	let mut clauses = Vec::new();
	if let Some(t) = filter.document_type {
		clauses.push(format!("document_type = {}", quote(t.as_str())));
	}
	if let Some(p) = &filter.video_path {
		clauses.push(format!("video_path = {}", quote(p)));
	}
	if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use vidseek_core::types::DocumentType;

	#[test]
	fn predicate_escapes_quotes() {
		let f = DocumentFilter { document_type: Some(DocumentType::Transcript), video_path: Some("/v/it's.mp4".into()) };
		assert_eq!(
			filter_predicate(&f).as_deref(),
			Some("document_type = 'transcript' AND video_path = '/v/it''s.mp4'")
		);
		assert!(filter_predicate(&DocumentFilter::default()).is_none());
	}
}
