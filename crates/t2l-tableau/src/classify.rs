//! Worksheet classification into a dashboard visualization type

use t2l_lookml::VisualizationType;

use crate::workbook::{FieldRole, FieldType, FieldUse, InstanceId, Worksheet};

/// Field lists a worksheet shows, by placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shelves<'a> {
    pub rows: &'a [FieldUse],
    pub cols: &'a [FieldUse],
    pub text: &'a [FieldUse],
    pub size: &'a [FieldUse],
    pub color: &'a [FieldUse],
}

impl<'a> Shelves<'a> {
    pub fn of(sheet: &'a Worksheet) -> Self {
        Self {
            rows: &sheet.rows,
            cols: &sheet.cols,
            text: &sheet.pane_text,
            size: &sheet.pane_size,
            color: &sheet.pane_color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: VisualizationType,
    /// Rows, columns, text, size, color; first occurrence wins
    pub fields: Vec<InstanceId>,
    pub pivots: Vec<InstanceId>,
}

fn is_measure(field: &FieldUse) -> bool {
    field.role == FieldRole::Measure
}

fn is_continuous_dimension(field: &FieldUse) -> bool {
    field.role == FieldRole::Dimension && matches!(field.field_type, FieldType::Ordinal | FieldType::Quantitative)
}

/// Visualization for a mark class; `None` for marks with no counterpart.
pub fn visualization(mark: &str, shelves: &Shelves<'_>) -> Option<VisualizationType> {
    let kind = match mark {
        "Text" | "Square" => VisualizationType::Table,
        "Bar" => VisualizationType::Column,
        "Line" => VisualizationType::Line,
        "Area" => VisualizationType::Area,
        "Pie" => VisualizationType::Pie,
        "Shape" => VisualizationType::Scatter,
        "Automatic" => automatic(shelves),
        _ => return None,
    };
    Some(kind)
}

fn automatic(shelves: &Shelves<'_>) -> VisualizationType {
    let measure_rows = shelves.rows.iter().any(is_measure);
    let measure_cols = shelves.cols.iter().any(is_measure);

    if measure_rows && measure_cols {
        VisualizationType::Scatter
    } else if shelves.rows.iter().all(is_continuous_dimension) && measure_cols {
        VisualizationType::Line
    } else if shelves.cols.iter().all(is_continuous_dimension) && measure_rows {
        VisualizationType::Line
    } else if measure_cols {
        VisualizationType::Bar
    } else if measure_rows {
        VisualizationType::Column
    } else if shelves.rows.is_empty() && shelves.cols.is_empty() && shelves.text.len() == 1 && is_measure(&shelves.text[0]) {
        VisualizationType::SingleValue
    } else {
        VisualizationType::Table
    }
}

fn instances(fields: &[FieldUse]) -> Vec<InstanceId> {
    fields.iter().map(|f| f.instance).collect()
}

/// Classify a worksheet and pick its fields and pivots.
pub fn classify(mark: &str, shelves: &Shelves<'_>) -> Option<Classification> {
    let kind = visualization(mark, shelves)?;

    let mut fields = Vec::new();
    for field in shelves
        .rows
        .iter()
        .chain(shelves.cols)
        .chain(shelves.text)
        .chain(shelves.size)
        .chain(shelves.color)
    {
        if !fields.contains(&field.instance) {
            fields.push(field.instance);
        }
    }

    let pivots = match kind {
        VisualizationType::Column => instances(shelves.cols.get(1..).unwrap_or_default()),
        VisualizationType::Bar => instances(shelves.rows.get(1..).unwrap_or_default()),
        VisualizationType::Line => instances(shelves.color),
        _ => instances(shelves.cols),
    };

    Some(Classification { kind, fields, pivots })
}

pub fn classify_worksheet(sheet: &Worksheet) -> Option<Classification> {
    classify(sheet.mark(), &Shelves::of(sheet))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(i: usize, field_type: FieldType) -> FieldUse {
        FieldUse {
            instance: InstanceId(i),
            role: FieldRole::Dimension,
            field_type,
        }
    }

    fn measure(i: usize) -> FieldUse {
        FieldUse {
            instance: InstanceId(i),
            role: FieldRole::Measure,
            field_type: FieldType::Quantitative,
        }
    }

    #[test]
    fn test_automatic_line() {
        let rows = [dim(0, FieldType::Ordinal)];
        let cols = [measure(1)];
        let color = [dim(2, FieldType::Nominal)];
        let shelves = Shelves {
            rows: &rows,
            cols: &cols,
            color: &color,
            ..Shelves::default()
        };
        let c = classify("Automatic", &shelves).unwrap();
        assert_eq!(c.kind, VisualizationType::Line);
        assert_eq!(c.fields, vec![InstanceId(0), InstanceId(1), InstanceId(2)]);
        assert_eq!(c.pivots, vec![InstanceId(2)]);
    }

    #[test]
    fn test_fixed_bar_is_column() {
        let rows = [measure(0)];
        let cols = [dim(1, FieldType::Nominal), dim(2, FieldType::Nominal)];
        let shelves = Shelves {
            rows: &rows,
            cols: &cols,
            ..Shelves::default()
        };
        let c = classify("Bar", &shelves).unwrap();
        assert_eq!(c.kind, VisualizationType::Column);
        assert_eq!(c.pivots, vec![InstanceId(2)]);
    }

    #[test]
    fn test_automatic_scatter_and_bar() {
        let rows = [measure(0)];
        let cols = [measure(1)];
        let both = Shelves {
            rows: &rows,
            cols: &cols,
            ..Shelves::default()
        };
        assert_eq!(visualization("Automatic", &both), Some(VisualizationType::Scatter));

        let nominal_rows = [dim(2, FieldType::Nominal), dim(3, FieldType::Nominal)];
        let bar = Shelves {
            rows: &nominal_rows,
            cols: &cols,
            ..Shelves::default()
        };
        let c = classify("Automatic", &bar).unwrap();
        assert_eq!(c.kind, VisualizationType::Bar);
        assert_eq!(c.pivots, vec![InstanceId(3)]);
    }

    #[test]
    fn test_automatic_column() {
        let rows = [measure(0)];
        let cols = [dim(1, FieldType::Nominal)];
        let shelves = Shelves {
            rows: &rows,
            cols: &cols,
            ..Shelves::default()
        };
        assert_eq!(visualization("Automatic", &shelves), Some(VisualizationType::Column));
    }

    #[test]
    fn test_single_value_and_table() {
        let text = [measure(0)];
        let single = Shelves {
            text: &text,
            ..Shelves::default()
        };
        assert_eq!(visualization("Automatic", &single), Some(VisualizationType::SingleValue));

        let rows = [dim(1, FieldType::Nominal)];
        let table = Shelves {
            rows: &rows,
            ..Shelves::default()
        };
        assert_eq!(visualization("Automatic", &table), Some(VisualizationType::Table));
    }

    #[test]
    fn test_unsupported_marks() {
        let shelves = Shelves::default();
        assert_eq!(classify("GanttBar", &shelves), None);
        assert_eq!(classify("Multipolygon", &shelves), None);
        assert_eq!(classify("Polygon", &shelves), None);
    }

    #[test]
    fn test_fields_deduplicated() {
        let rows = [dim(0, FieldType::Nominal)];
        let text = [measure(1)];
        let color = [dim(0, FieldType::Nominal)];
        let shelves = Shelves {
            rows: &rows,
            text: &text,
            color: &color,
            ..Shelves::default()
        };
        let c = classify("Text", &shelves).unwrap();
        assert_eq!(c.kind, VisualizationType::Table);
        assert_eq!(c.fields, vec![InstanceId(0), InstanceId(1)]);
    }
}
