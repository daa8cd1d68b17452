//! Mapping between SQL Server's native types and the generic value kinds.
//!
//! The forward direction (native → generic) is strict: a native type name that
//! has no entry is an error. The reverse direction (generic → native), used to
//! infer structured-parameter column types from sample values, is permissive and
//! falls back to `sql_variant`.

use std::fmt;
use std::str::FromStr;

use crate::error::SqlDispatchError;

/// SQL Server's native type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDbType {
    BigInt,
    Binary,
    Bit,
    Char,
    DateTime,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    UniqueIdentifier,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Text,
    Timestamp,
    TinyInt,
    VarBinary,
    VarChar,
    Variant,
    Xml,
    Udt,
    Structured,
    Date,
    Time,
    DateTime2,
    DateTimeOffset,
    /// A nested cursor (`CURSOR` output); never materialized.
    Cursor,
}

impl SqlDbType {
    /// The engine's name for this type.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            SqlDbType::BigInt => "bigint",
            SqlDbType::Binary => "binary",
            SqlDbType::Bit => "bit",
            SqlDbType::Char => "char",
            SqlDbType::DateTime => "datetime",
            SqlDbType::Decimal => "decimal",
            SqlDbType::Float => "float",
            SqlDbType::Image => "image",
            SqlDbType::Int => "int",
            SqlDbType::Money => "money",
            SqlDbType::NChar => "nchar",
            SqlDbType::NText => "ntext",
            SqlDbType::NVarChar => "nvarchar",
            SqlDbType::Real => "real",
            SqlDbType::UniqueIdentifier => "uniqueidentifier",
            SqlDbType::SmallDateTime => "smalldatetime",
            SqlDbType::SmallInt => "smallint",
            SqlDbType::SmallMoney => "smallmoney",
            SqlDbType::Text => "text",
            SqlDbType::Timestamp => "timestamp",
            SqlDbType::TinyInt => "tinyint",
            SqlDbType::VarBinary => "varbinary",
            SqlDbType::VarChar => "varchar",
            SqlDbType::Variant => "sql_variant",
            SqlDbType::Xml => "xml",
            SqlDbType::Udt => "udt",
            SqlDbType::Structured => "table",
            SqlDbType::Date => "date",
            SqlDbType::Time => "time",
            SqlDbType::DateTime2 => "datetime2",
            SqlDbType::DateTimeOffset => "datetimeoffset",
            SqlDbType::Cursor => "cursor",
        }
    }
}

impl fmt::Display for SqlDbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for SqlDbType {
    type Err = SqlDispatchError;

    /// Parse a native type name. Accepts the engine's names plus the TDS wire
    /// names tiberius reports (`intn`, `bigvarbin`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "bigint" | "int8" => SqlDbType::BigInt,
            "binary" | "bigbinary" => SqlDbType::Binary,
            "bit" | "bitn" => SqlDbType::Bit,
            "char" | "bigchar" => SqlDbType::Char,
            "datetime" | "datetimen" => SqlDbType::DateTime,
            "decimal" | "numeric" | "decimaln" | "numericn" => SqlDbType::Decimal,
            "float" | "float8" | "floatn" => SqlDbType::Float,
            "image" => SqlDbType::Image,
            "int" | "int4" | "intn" => SqlDbType::Int,
            "money" => SqlDbType::Money,
            "nchar" => SqlDbType::NChar,
            "ntext" => SqlDbType::NText,
            "nvarchar" | "sysname" => SqlDbType::NVarChar,
            "real" | "float4" => SqlDbType::Real,
            "uniqueidentifier" | "guid" => SqlDbType::UniqueIdentifier,
            "smalldatetime" | "datetime4" => SqlDbType::SmallDateTime,
            "smallint" | "int2" => SqlDbType::SmallInt,
            "smallmoney" | "money4" => SqlDbType::SmallMoney,
            "text" => SqlDbType::Text,
            "timestamp" | "rowversion" => SqlDbType::Timestamp,
            "tinyint" | "int1" => SqlDbType::TinyInt,
            "varbinary" | "bigvarbin" => SqlDbType::VarBinary,
            "varchar" | "bigvarchar" => SqlDbType::VarChar,
            "sql_variant" | "variant" | "ssvariant" => SqlDbType::Variant,
            "xml" => SqlDbType::Xml,
            "udt" => SqlDbType::Udt,
            "table" | "structured" => SqlDbType::Structured,
            "date" | "daten" => SqlDbType::Date,
            "time" | "timen" => SqlDbType::Time,
            "datetime2" => SqlDbType::DateTime2,
            "datetimeoffset" | "datetimeoffsetn" => SqlDbType::DateTimeOffset,
            "cursor" => SqlDbType::Cursor,
            _ => return Err(SqlDispatchError::UnrecognizedNativeType(s.to_string())),
        };
        Ok(ty)
    }
}

/// Generic value kinds on the host side of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    UInt8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Bool,
    Text,
    Binary,
    DateTime,
    DateTimeOffset,
    Uuid,
    /// Tabular data (a structured parameter)
    Table,
    /// A nested result cursor
    Reader,
    /// Opaque value of no fixed kind
    Variant,
}

/// Native type → generic kind. Total over `SqlDbType`.
#[must_use]
pub fn value_kind(sql_type: SqlDbType) -> ValueKind {
    match sql_type {
        SqlDbType::BigInt => ValueKind::Int64,
        SqlDbType::Binary | SqlDbType::Image | SqlDbType::Timestamp | SqlDbType::VarBinary => {
            ValueKind::Binary
        }
        SqlDbType::Bit => ValueKind::Bool,
        SqlDbType::Char
        | SqlDbType::NChar
        | SqlDbType::NText
        | SqlDbType::NVarChar
        | SqlDbType::Text
        | SqlDbType::VarChar
        | SqlDbType::Xml => ValueKind::Text,
        SqlDbType::DateTime
        | SqlDbType::SmallDateTime
        | SqlDbType::Date
        | SqlDbType::Time
        | SqlDbType::DateTime2 => ValueKind::DateTime,
        SqlDbType::Decimal | SqlDbType::Money | SqlDbType::SmallMoney => ValueKind::Decimal,
        SqlDbType::Float => ValueKind::Float64,
        SqlDbType::Int => ValueKind::Int32,
        SqlDbType::Real => ValueKind::Float32,
        SqlDbType::UniqueIdentifier => ValueKind::Uuid,
        SqlDbType::SmallInt => ValueKind::Int16,
        SqlDbType::TinyInt => ValueKind::UInt8,
        SqlDbType::Variant | SqlDbType::Udt => ValueKind::Variant,
        SqlDbType::Structured => ValueKind::Table,
        SqlDbType::DateTimeOffset => ValueKind::DateTimeOffset,
        SqlDbType::Cursor => ValueKind::Reader,
    }
}

/// Native type name → generic kind.
///
/// # Errors
/// Returns `SqlDispatchError::UnrecognizedNativeType` if the name has no mapping.
pub fn value_kind_for_type_name(type_name: &str) -> Result<ValueKind, SqlDispatchError> {
    type_name.parse().map(value_kind)
}

/// Generic kind → native type, falling back to `sql_variant`.
#[must_use]
pub fn sql_db_type(kind: ValueKind) -> SqlDbType {
    match kind {
        ValueKind::Int64 => SqlDbType::BigInt,
        ValueKind::Binary => SqlDbType::Binary,
        ValueKind::Bool => SqlDbType::Bit,
        ValueKind::Text => SqlDbType::VarChar,
        ValueKind::DateTime => SqlDbType::DateTime2,
        ValueKind::Float64 => SqlDbType::Float,
        ValueKind::Int32 => SqlDbType::Int,
        ValueKind::Float32 => SqlDbType::Real,
        ValueKind::Uuid => SqlDbType::UniqueIdentifier,
        ValueKind::Int16 => SqlDbType::SmallInt,
        ValueKind::UInt8 => SqlDbType::TinyInt,
        ValueKind::Table => SqlDbType::Structured,
        ValueKind::DateTimeOffset => SqlDbType::DateTimeOffset,
        ValueKind::Decimal | ValueKind::Reader | ValueKind::Variant => SqlDbType::Variant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("DateTime2".parse::<SqlDbType>().unwrap(), SqlDbType::DateTime2);
        assert_eq!("NVARCHAR".parse::<SqlDbType>().unwrap(), SqlDbType::NVarChar);
        assert_eq!(" int ".parse::<SqlDbType>().unwrap(), SqlDbType::Int);
    }

    #[test]
    fn accepts_tds_wire_names() {
        assert_eq!("intn".parse::<SqlDbType>().unwrap(), SqlDbType::Int);
        assert_eq!("BigVarBin".parse::<SqlDbType>().unwrap(), SqlDbType::VarBinary);
        assert_eq!("datetimeoffsetn".parse::<SqlDbType>().unwrap(), SqlDbType::DateTimeOffset);
    }

    #[test]
    fn unknown_native_type_is_rejected() {
        let err = value_kind_for_type_name("geography").unwrap_err();
        assert!(matches!(err, SqlDispatchError::UnrecognizedNativeType(name) if name == "geography"));
    }

    #[test]
    fn forward_table() {
        assert_eq!(value_kind(SqlDbType::Timestamp), ValueKind::Binary);
        assert_eq!(value_kind(SqlDbType::Xml), ValueKind::Text);
        assert_eq!(value_kind(SqlDbType::Time), ValueKind::DateTime);
        assert_eq!(value_kind(SqlDbType::SmallMoney), ValueKind::Decimal);
        assert_eq!(value_kind(SqlDbType::TinyInt), ValueKind::UInt8);
        assert_eq!(value_kind(SqlDbType::Udt), ValueKind::Variant);
        assert_eq!(value_kind(SqlDbType::Structured), ValueKind::Table);
        assert_eq!(value_kind(SqlDbType::Cursor), ValueKind::Reader);
    }

    #[test]
    fn reverse_table_falls_back_to_variant() {
        assert_eq!(sql_db_type(ValueKind::Int64), SqlDbType::BigInt);
        assert_eq!(sql_db_type(ValueKind::Text), SqlDbType::VarChar);
        assert_eq!(sql_db_type(ValueKind::DateTime), SqlDbType::DateTime2);
        assert_eq!(sql_db_type(ValueKind::Decimal), SqlDbType::Variant);
        assert_eq!(sql_db_type(ValueKind::Variant), SqlDbType::Variant);
    }

    #[test]
    fn names_round_trip_through_parse() {
        for ty in [
            SqlDbType::BigInt,
            SqlDbType::SmallDateTime,
            SqlDbType::UniqueIdentifier,
            SqlDbType::Variant,
            SqlDbType::Structured,
            SqlDbType::Cursor,
        ] {
            assert_eq!(ty.type_name().parse::<SqlDbType>().unwrap(), ty);
        }
    }
}
