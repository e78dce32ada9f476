//! Macros and helpers

/// Creates an [crate::sv::Sv] from given string description,
/// which must be valid.
#[macro_export]
macro_rules! sv {
    ($desc: expr) => {
        $desc.parse::<$crate::sv::Sv>().unwrap()
    };
}

/// Creates an [crate::observable::ObsCode] from given string
/// description, which must be valid.
#[macro_export]
macro_rules! obscode {
    ($desc: expr) => {
        $desc.parse::<$crate::observable::ObsCode>().unwrap()
    };
}
