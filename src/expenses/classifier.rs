//! Keyword classifier — first category with a matching keyword wins.

use tracing::debug;

use crate::expenses::categories::CategoryTable;
use crate::expenses::types::{ClassifiedExpense, ExpenseRecord, UNCATEGORIZED};

/// Assigns categories by case-insensitive substring match on the detail.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: CategoryTable,
}

impl Classifier {
    pub fn new(table: CategoryTable) -> Self {
        Self { table }
    }

    /// Category name for a record, or [`UNCATEGORIZED`].
    pub fn category_for(&self, record: &ExpenseRecord) -> &str {
        let detail = record.detail.as_deref().unwrap_or_default().to_lowercase();
        self.table
            .iter()
            .find(|category| category.keywords.iter().any(|k| detail.contains(k.as_str())))
            .map(|category| category.name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    /// Classify one record.
    pub fn classify(&self, record: ExpenseRecord) -> ClassifiedExpense {
        let category = self.category_for(&record).to_string();
        debug!(
            detail = record.detail.as_deref().unwrap_or(""),
            category = %category,
            "Classified expense"
        );
        ClassifiedExpense { record, category }
    }

    /// Classify records, keeping their order.
    pub fn classify_batch(&self, records: Vec<ExpenseRecord>) -> Vec<ClassifiedExpense> {
        records.into_iter().map(|r| self.classify(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CategoryTable {
        CategoryTable::from_pairs([
            ("transporte", vec!["metro", "bus", "EMPRESA MALAGUE"]),
            ("salud", vec!["farmacia"]),
            ("comida", vec!["cafeteria", "bar"]),
        ])
        .unwrap()
    }

    fn record(detail: Option<&str>) -> ExpenseRecord {
        ExpenseRecord::new("2025-10-15", Some("1.35"), detail)
    }

    #[test]
    fn matches_keyword_case_insensitively() {
        let classifier = Classifier::new(table());
        let classified = classifier.classify(record(Some("METRO DE MALAGA")));
        assert_eq!(classified.category, "transporte");
        assert_eq!(classified.record.detail.as_deref(), Some("METRO DE MALAGA"));
    }

    #[test]
    fn mixed_case_keyword_in_config() {
        let classifier = Classifier::new(table());
        assert_eq!(
            classifier.category_for(&record(Some("Empresa Malague SA"))),
            "transporte"
        );
    }

    #[test]
    fn unknown_merchant_is_uncategorized() {
        let classifier = Classifier::new(table());
        assert_eq!(
            classifier.category_for(&record(Some("UNKNOWN MERCHANT XYZ"))),
            UNCATEGORIZED
        );
    }

    #[test]
    fn absent_detail_is_uncategorized() {
        let classifier = Classifier::new(table());
        assert_eq!(classifier.category_for(&record(None)), UNCATEGORIZED);
    }

    #[test]
    fn empty_keyword_matches_every_detail() {
        let classifier = Classifier::new(
            CategoryTable::from_json_str(r#"{"salud": ["farmacia"], "varios": [""]}"#, "inline")
                .unwrap(),
        );
        assert_eq!(classifier.category_for(&record(Some("FARMACIA CAMINO"))), "salud");
        assert_eq!(classifier.category_for(&record(Some("UNKNOWN XYZ"))), "varios");
        assert_eq!(classifier.category_for(&record(None)), "varios");
    }

    #[test]
    fn blank_category_name_is_assigned() {
        let classifier = Classifier::new(
            CategoryTable::from_json_str(r#"{" ": ["metro"]}"#, "inline").unwrap(),
        );
        assert_eq!(classifier.category_for(&record(Some("METRO DE MALAGA"))), " ");
    }

    #[test]
    fn empty_table_is_uncategorized() {
        let classifier = Classifier::new(CategoryTable::default());
        assert_eq!(
            classifier.category_for(&record(Some("METRO"))),
            UNCATEGORIZED
        );
    }

    #[test]
    fn earlier_category_wins_tie() {
        let classifier = Classifier::new(
            CategoryTable::from_pairs([("ocio", vec!["bar"]), ("comida", vec!["bar"])]).unwrap(),
        );
        assert_eq!(classifier.category_for(&record(Some("BAR PACO"))), "ocio");

        let reversed = Classifier::new(
            CategoryTable::from_pairs([("comida", vec!["bar"]), ("ocio", vec!["bar"])]).unwrap(),
        );
        assert_eq!(reversed.category_for(&record(Some("BAR PACO"))), "comida");
    }

    #[test]
    fn substring_match_inside_word() {
        // "bar" is contained in "BARBERIA" — containment, not word match.
        let classifier = Classifier::new(table());
        assert_eq!(
            classifier.category_for(&record(Some("BARBERIA LUIS"))),
            "comida"
        );
    }

    #[test]
    fn category_is_table_key_or_sentinel() {
        let classifier = Classifier::new(table());
        let details = [
            Some("FARMACIA CAMINO"),
            Some("CAFETERIA NAVAR"),
            Some("??"),
            None,
            Some(""),
        ];
        for detail in details {
            let category = classifier.category_for(&record(detail));
            assert!(
                category == UNCATEGORIZED || table().iter().any(|c| c.name == category),
                "unexpected category {category}"
            );
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = Classifier::new(table());
        let r = record(Some("FARMACIA CAMINO"));
        let first = classifier.classify(r.clone());
        let second = classifier.classify(r);
        assert_eq!(first, second);
        assert_eq!(first.category, "salud");
    }

    #[test]
    fn batch_preserves_order_and_length() {
        let classifier = Classifier::new(table());
        let records = vec![
            record(Some("METRO DE MALAGA")),
            record(Some("EMPRESA MALAGUE")),
            record(Some("FARMACIA CAMINO")),
            record(None),
        ];
        let classified = classifier.classify_batch(records.clone());

        assert_eq!(classified.len(), records.len());
        for (input, output) in records.iter().zip(&classified) {
            assert_eq!(&output.record, input);
        }
        let categories: Vec<&str> = classified.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(categories, ["transporte", "transporte", "salud", UNCATEGORIZED]);
    }

    #[test]
    fn empty_batch() {
        let classifier = Classifier::new(table());
        assert!(classifier.classify_batch(Vec::new()).is_empty());
    }
}
