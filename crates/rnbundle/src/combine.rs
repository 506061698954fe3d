use std::path::PathBuf;

pub trait Combine {
    /// Combine two values, preferring the values in `self`.
    ///
    /// Scalars and lists from the higher precedence layer (`self`) replace those of `other`.
    /// Lists are never joined. Tables are combined key by key.
    #[must_use]
    fn combine(self, other: Self) -> Self;
}

macro_rules! impl_combine_or {
    ($name:ty) => {
        impl Combine for Option<$name> {
            fn combine(self, other: Option<$name>) -> Option<$name> {
                self.or(other)
            }
        }
    };
}

impl_combine_or!(String);
impl_combine_or!(PathBuf);
impl_combine_or!(Vec<String>);

/// Implements [`Combine`] for an optional config table: tables present in only one layer are
/// taken as-is, tables present in both are merged field by field.
#[macro_export]
macro_rules! impl_combine_table {
    ($name:ty) => {
        impl $crate::combine::Combine for Option<$name> {
            fn combine(self, other: Option<$name>) -> Option<$name> {
                match (self, other) {
                    (Some(a), Some(b)) => Some($crate::combine::Combine::combine(a, b)),
                    (a, b) => a.or(b),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Table {
        a: Option<String>,
        b: Option<Vec<String>>,
    }

    crate::impl_combine_table!(Table);

    impl Combine for Table {
        fn combine(self, other: Self) -> Self {
            Self {
                a: self.a.combine(other.a),
                b: self.b.combine(other.b),
            }
        }
    }

    #[test]
    fn test_scalars_prefer_self() {
        assert_eq!(
            Some("high".to_owned()).combine(Some("low".to_owned())),
            Some("high".to_owned())
        );
        assert_eq!(
            None.combine(Some(PathBuf::from("low"))),
            Some(PathBuf::from("low"))
        );
        assert_eq!(Option::<String>::None.combine(None), None);
    }

    #[test]
    fn test_lists_are_replaced_not_joined() {
        let high = Some(vec!["android".to_owned()]);
        let low = Some(vec!["ios".to_owned(), "android".to_owned()]);
        assert_eq!(high.combine(low), Some(vec!["android".to_owned()]));
    }

    #[test]
    fn test_tables_merge_field_by_field() {
        let high = Some(Table {
            a: Some("high".to_owned()),
            b: None,
        });
        let low = Some(Table {
            a: Some("low".to_owned()),
            b: Some(vec!["x".to_owned()]),
        });
        assert_eq!(
            high.combine(low),
            Some(Table {
                a: Some("high".to_owned()),
                b: Some(vec!["x".to_owned()]),
            })
        );
    }
}
