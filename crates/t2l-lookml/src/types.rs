//! Closed LookML vocabularies shared by the model and the translator

use serde::Serialize;
use std::fmt;

macro_rules! lookml_tags {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// LookML spelling of the tag
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lookml_tags! {
    /// `type:` of a dimension
    FieldKind {
        String => "string",
        Number => "number",
        Time => "time",
        YesNo => "yesno",
    }
}

lookml_tags! {
    /// Keyword that opens a field block
    FieldStruct {
        Dimension => "dimension",
        DimensionGroup => "dimension_group",
        Measure => "measure",
        Parameter => "parameter",
    }
}

lookml_tags! {
    /// `datatype:` of a time dimension group
    TimeDatatype {
        Date => "date",
        Datetime => "datetime",
    }
}

lookml_tags! {
    /// Time granularity; declaration order is emission order
    Timeframe {
        Raw => "raw",
        Date => "date",
        Week => "week",
        Month => "month",
        Quarter => "quarter",
        Year => "year",
    }
}

lookml_tags! {
    JoinKind {
        LeftOuter => "left_outer",
        Inner => "inner",
        FullOuter => "full_outer",
    }
}

lookml_tags! {
    /// `relationship:` of a join
    Cardinality {
        ManyToMany => "many_to_many",
    }
}

lookml_tags! {
    /// `type:` of a measure
    Aggregation {
        Sum => "sum",
        Count => "count",
        CountDistinct => "count_distinct",
        Average => "average",
    }
}

lookml_tags! {
    /// `type:` of a dashboard element
    VisualizationType {
        Column => "looker_column",
        Bar => "looker_bar",
        Scatter => "looker_scatter",
        Line => "looker_line",
        Area => "looker_area",
        Pie => "looker_pie",
        Table => "table",
        SingleValue => "single_value",
    }
}

impl Timeframe {
    /// Granularities every time dimension group is generated with.
    pub const DEFAULT_SET: [Timeframe; 6] = [
        Timeframe::Raw,
        Timeframe::Date,
        Timeframe::Week,
        Timeframe::Month,
        Timeframe::Quarter,
        Timeframe::Year,
    ];
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::ManyToMany
    }
}

impl Default for JoinKind {
    fn default() -> Self {
        JoinKind::LeftOuter
    }
}
