//! Macros for defining kind enums.

/// Macro for defining a closed kind enum, persisted and serialized as its
/// string code.
///
/// # Example
///
/// ```rust
/// # use common::define_kind;
///
/// define_kind! {
///     #[doc = "Shape kind."]
///     enum Kind {
///         #[doc = "A cube"]
///         Cube = "CUBE",
///
///         #[doc = "A sphere"]
///         Sphere = "SPHERE",
///     }
/// }
///
/// assert_eq!(Kind::Cube.code(), "CUBE");
/// assert_eq!("SPHERE".parse::<Kind>(), Ok(Kind::Sphere));
/// ```
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_kind {
    (
        #[doc = $doc:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                $variant:ident = $code:literal
            ),* $(,)?
        }
    ) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            $crate::private::strum::Display,
            $crate::private::strum::EnumIter,
            $crate::private::strum::EnumString,
            Eq,
            Hash,
            PartialEq,
        )]
        #[cfg_attr(
            feature = "serde",
            derive(
                $crate::private::serde::Deserialize,
                $crate::private::serde::Serialize,
            ),
        )]
        #[doc = $doc]
        pub enum $name {
            $(
                #[doc = $variant_doc]
                #[strum(serialize = $code)]
                #[cfg_attr(feature = "serde", serde(rename = $code))]
                $variant,
            )*
        }

        impl $name {
            /// Returns the string code this kind is persisted as.
            #[must_use]
            pub const fn code(self) -> &'static str {
                match self {
                    $(
                        Self::$variant => $code,
                    )*
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> $crate::private::postgres_types::FromSql<'a> for $name {
            $crate::private::postgres_types::accepts!(VARCHAR, TEXT, BPCHAR);

            fn from_sql(
                ty: &$crate::private::postgres_types::Type,
                raw: &'a [u8],
            ) -> Result<
                $name,
                Box<dyn ::std::error::Error
                    + ::core::marker::Sync
                    + ::core::marker::Send>,
            > {
                let code = <&str>::from_sql(ty, raw)?;
                <$name as ::core::str::FromStr>::from_str(code).map_err(|_| {
                    ::std::format!(
                        "invalid `{}` code: {code}",
                        ::core::stringify!($name),
                    )
                    .into()
                })
            }
        }

        #[cfg(feature = "postgres")]
        impl $crate::private::postgres_types::ToSql for $name {
            $crate::private::postgres_types::accepts!(VARCHAR, TEXT, BPCHAR);
            $crate::private::postgres_types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &$crate::private::postgres_types::Type,
                w: &mut $crate::private::postgres_types::private::BytesMut,
            ) -> Result<
                $crate::private::postgres_types::IsNull,
                ::std::boxed::Box<
                    dyn ::std::error::Error
                        + ::core::marker::Sync
                        + ::core::marker::Send
                >,
            > {
                self.code().to_sql(ty, w)
            }
        }
    };
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use strum::IntoEnumIterator as _;

    crate::define_kind! {
        #[doc = "Test kind."]
        enum Status {
            #[doc = "Waiting."]
            Waiting = "CHO_DUYET",

            #[doc = "Done."]
            Done = "DA_DUYET",
        }
    }

    #[test]
    fn maps_codes_both_ways() {
        for status in Status::iter() {
            assert_eq!(Status::from_str(status.code()), Ok(status));
            assert_eq!(status.to_string(), status.code());
        }
        assert_eq!(Status::Waiting.code(), "CHO_DUYET");
        assert!(Status::from_str("Waiting").is_err());
    }
}
