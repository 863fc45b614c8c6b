use crate::engine::core::page::{Page, PageBuilder};
use crate::engine::types::{ScalarValue, Type};

pub struct PageFactory {
    types: Vec<Type>,
    rows: Vec<Vec<ScalarValue>>,
}

impl PageFactory {
    pub fn new() -> Self {
        Self {
            types: vec![Type::BigInt],
            rows: Vec::new(),
        }
    }

    pub fn with_types(mut self, types: Vec<Type>) -> Self {
        self.types = types;
        self
    }

    pub fn with_row(mut self, row: Vec<ScalarValue>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_rows(mut self, rows: Vec<Vec<ScalarValue>>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Single bigint column holding `start, start + 1, ...`.
    pub fn with_sequence(mut self, start: i64, count: usize) -> Self {
        self.types = vec![Type::BigInt];
        self.rows = (0..count as i64)
            .map(|i| vec![ScalarValue::BigInt(start + i)])
            .collect();
        self
    }

    pub fn types(&self) -> Vec<Type> {
        self.types.clone()
    }

    pub fn create(self) -> Page {
        build_page(&self.types, &self.rows)
    }

    /// Splits the rows into pages of at most `page_size` rows.
    pub fn create_list(self, page_size: usize) -> Vec<Page> {
        self.rows
            .chunks(page_size.max(1))
            .map(|chunk| build_page(&self.types, chunk))
            .collect()
    }
}

fn build_page(types: &[Type], rows: &[Vec<ScalarValue>]) -> Page {
    let mut builder = PageBuilder::with_limits(types.to_vec(), rows.len().max(1), u64::MAX);
    for row in rows {
        assert_eq!(row.len(), types.len(), "row width must match types");
        for (channel, (ty, value)) in types.iter().zip(row).enumerate() {
            ty.write_value(builder.builder(channel).unwrap(), value)
                .expect("value matches column type");
        }
        builder.declare_position();
    }
    builder.build().expect("page builds")
}
