/// One row of an uploaded consumption table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConsumptionRecord {
    pub name: String,
    pub consumption_kwh: f64,
    pub date: Option<String>,
}

/// An uploaded table, in input order.
///
/// Besides the typed records it keeps the original header and the raw cell
/// text of every row, so exports can reproduce columns the analysis ignores.
/// `rows[i]` is always the source of `records[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    records: Vec<ConsumptionRecord>,
}

impl ConsumptionTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Builds a table with a `name,consumptionKwh,date` header from typed records.
    pub fn from_records(records: Vec<ConsumptionRecord>) -> Self {
        let mut table = Self::new(vec![
            "name".to_string(),
            "consumptionKwh".to_string(),
            "date".to_string(),
        ]);
        for record in records {
            let cells = vec![
                record.name.clone(),
                record.consumption_kwh.to_string(),
                record.date.clone().unwrap_or_default(),
            ];
            table.push_row(cells, record);
        }
        table
    }

    pub fn push_row(&mut self, cells: Vec<String>, record: ConsumptionRecord) {
        self.rows.push(cells);
        self.records.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn records(&self) -> &[ConsumptionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of consumption over every row carrying `name`.
    pub fn total_for(&self, name: &str) -> f64 {
        self.records
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.consumption_kwh)
            .sum()
    }
}
