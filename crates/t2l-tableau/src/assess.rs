//! Per-worksheet migration assessment

use serde::Serialize;

use crate::classify::{visualization, Shelves};
use crate::workbook::{RelationKind, Workbook, Worksheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

const LOD_KEYWORDS: [&str; 3] = ["FIXED", "INCLUDE", "EXCLUDE"];
const TABLE_CALC_KEYWORDS: [&str; 9] = [
    "WINDOW", "INDEX(", "LOOKUP(", "RUNNING_", "PREVIOUS_VALUE", "RANK(", "TOTAL(", "FIRST(", "LAST(",
];
const RAW_SQL_KEYWORDS: [&str; 2] = ["RAWSQL", "RAW_SQL"];

/// Complexity of a calculated-field formula.
///
/// Level-of-detail expressions, table calculations and raw SQL are complex;
/// every other formula is medium.
pub fn formula_complexity(formula: &str) -> Complexity {
    let upper = formula.to_uppercase();
    let complex = LOD_KEYWORDS
        .iter()
        .chain(TABLE_CALC_KEYWORDS.iter())
        .chain(RAW_SQL_KEYWORDS.iter())
        .any(|keyword| upper.contains(keyword));
    if complex {
        Complexity::Complex
    } else {
        Complexity::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorksheetAssessment {
    pub worksheet: String,
    pub classification: Complexity,
    pub reasons: Vec<String>,
    pub auto_migratable: bool,
    pub calculations: Vec<String>,
    pub datasources: Vec<String>,
}

pub fn assess_worksheet(workbook: &Workbook, sheet: &Worksheet) -> WorksheetAssessment {
    let mut complex_calcs = Vec::new();
    let mut medium_calcs = Vec::new();
    for id in &sheet.calculations {
        let calc = workbook.calculation(*id);
        match formula_complexity(&calc.formula) {
            Complexity::Complex => complex_calcs.push(calc.display_name().to_string()),
            _ => medium_calcs.push(calc.display_name().to_string()),
        }
    }

    let custom_sql: Vec<String> = sheet
        .datasources
        .iter()
        .filter(|ds| {
            workbook
                .datasource_relations(**ds)
                .iter()
                .any(|rel| workbook.relation(*rel).kind == RelationKind::Text)
        })
        .map(|ds| workbook.datasource(*ds).label().to_string())
        .collect();

    let unsupported_mark = visualization(sheet.mark(), &Shelves::of(sheet)).is_none();

    let mut reasons = Vec::new();
    let classification = if !complex_calcs.is_empty() || !custom_sql.is_empty() || unsupported_mark {
        if !complex_calcs.is_empty() {
            reasons.push(format!("complex calculations: {}", complex_calcs.join(", ")));
        }
        if !custom_sql.is_empty() {
            reasons.push(format!("custom SQL datasource: {}", custom_sql.join(", ")));
        }
        if unsupported_mark {
            reasons.push(format!("unsupported mark: {}", sheet.mark()));
        }
        Complexity::Complex
    } else if !medium_calcs.is_empty() || !sheet.parameters.is_empty() {
        if !medium_calcs.is_empty() {
            reasons.push(format!("basic calculations: {}", medium_calcs.join(", ")));
        }
        if !sheet.parameters.is_empty() {
            reasons.push(format!("parameters: {}", sheet.parameters.join(", ")));
        }
        Complexity::Medium
    } else {
        reasons.push("basic fields and standard visualizations only".to_string());
        Complexity::Simple
    };

    WorksheetAssessment {
        worksheet: sheet.name.clone(),
        classification,
        reasons,
        auto_migratable: classification != Complexity::Complex,
        calculations: complex_calcs.into_iter().chain(medium_calcs).collect(),
        datasources: sheet
            .datasources
            .iter()
            .map(|ds| workbook.datasource(*ds).label().to_string())
            .collect(),
    }
}

pub fn assess(workbook: &Workbook) -> Vec<WorksheetAssessment> {
    workbook
        .worksheets
        .iter()
        .map(|sheet| assess_worksheet(workbook, sheet))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{CalculatedField, CalculationId, DatasourceId, Pane};

    #[test]
    fn test_formula_complexity() {
        assert_eq!(formula_complexity("{ FIXED [Region] : SUM([Sales]) }"), Complexity::Complex);
        assert_eq!(formula_complexity("running_sum(SUM([Sales]))"), Complexity::Complex);
        assert_eq!(formula_complexity("RAWSQL_INT(\"1\")"), Complexity::Complex);
        assert_eq!(formula_complexity("SUM([Profit]) / SUM([Sales])"), Complexity::Medium);
    }

    fn workbook_with_calc(formula: &str) -> Workbook {
        Workbook {
            calculations: vec![CalculatedField {
                name: "Calculation_1".to_string(),
                caption: Some("Ratio".to_string()),
                formula: formula.to_string(),
                datasource: DatasourceId(0),
            }],
            ..Workbook::default()
        }
    }

    #[test]
    fn test_simple_worksheet() {
        let workbook = Workbook::default();
        let sheet = Worksheet {
            name: "Plain".to_string(),
            ..Worksheet::default()
        };
        let a = assess_worksheet(&workbook, &sheet);
        assert_eq!(a.classification, Complexity::Simple);
        assert!(a.auto_migratable);
    }

    #[test]
    fn test_medium_and_complex_calculations() {
        let sheet = Worksheet {
            name: "Calc".to_string(),
            calculations: vec![CalculationId(0)],
            ..Worksheet::default()
        };

        let medium = assess_worksheet(&workbook_with_calc("SUM([A]) / SUM([B])"), &sheet);
        assert_eq!(medium.classification, Complexity::Medium);
        assert_eq!(medium.reasons, vec!["basic calculations: Ratio"]);

        let complex = assess_worksheet(&workbook_with_calc("{ FIXED : SUM([A]) }"), &sheet);
        assert_eq!(complex.classification, Complexity::Complex);
        assert!(!complex.auto_migratable);
        assert_eq!(complex.calculations, vec!["Ratio"]);
    }

    #[test]
    fn test_unsupported_mark_is_complex() {
        let sheet = Worksheet {
            name: "Map".to_string(),
            panes: vec![Pane {
                mark: Some("Multipolygon".to_string()),
                ..Pane::default()
            }],
            ..Worksheet::default()
        };
        let a = assess_worksheet(&Workbook::default(), &sheet);
        assert_eq!(a.classification, Complexity::Complex);
        assert_eq!(a.reasons, vec!["unsupported mark: Multipolygon"]);
    }

    #[test]
    fn test_parameters_make_medium() {
        let sheet = Worksheet {
            name: "Param".to_string(),
            parameters: vec!["Top N".to_string()],
            ..Worksheet::default()
        };
        assert_eq!(assess_worksheet(&Workbook::default(), &sheet).classification, Complexity::Medium);
    }
}
