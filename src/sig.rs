//! JVM type signatures and descriptor parsing.

use std::fmt;

use crate::error::DecodeError;

/// A JVM type as recovered from a descriptor string.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSig {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// Internal-form class name, e.g. `java/lang/String`.
    Object(String),
    Array(Box<TypeSig>),
}

impl TypeSig {
    /// True for types occupying two local-variable slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, TypeSig::Long | TypeSig::Double)
    }

    /// The descriptor form of this type.
    pub fn descriptor(&self) -> String {
        match self {
            TypeSig::Boolean => "Z".into(),
            TypeSig::Byte => "B".into(),
            TypeSig::Char => "C".into(),
            TypeSig::Short => "S".into(),
            TypeSig::Int => "I".into(),
            TypeSig::Long => "J".into(),
            TypeSig::Float => "F".into(),
            TypeSig::Double => "D".into(),
            TypeSig::Void => "V".into(),
            TypeSig::Object(name) => format!("L{};", name),
            TypeSig::Array(inner) => format!("[{}", inner.descriptor()),
        }
    }

    /// Source-level spelling, with unqualified class names.
    pub fn source_name(&self) -> String {
        match self {
            TypeSig::Boolean => "boolean".into(),
            TypeSig::Byte => "byte".into(),
            TypeSig::Char => "char".into(),
            TypeSig::Short => "short".into(),
            TypeSig::Int => "int".into(),
            TypeSig::Long => "long".into(),
            TypeSig::Float => "float".into(),
            TypeSig::Double => "double".into(),
            TypeSig::Void => "void".into(),
            TypeSig::Object(name) => simple_name(name).to_string(),
            TypeSig::Array(inner) => format!("{}[]", inner.source_name()),
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source_name())
    }
}

/// A parsed method descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSig {
    pub params: Vec<TypeSig>,
    pub ret: TypeSig,
}

impl MethodSig {
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn returns_value(&self) -> bool {
        self.ret != TypeSig::Void
    }
}

struct SigReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SigReader<'a> {
    fn new(desc: &'a str) -> Self {
        SigReader { bytes: desc.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn read_type(&mut self) -> Option<TypeSig> {
        match self.bump()? {
            b'Z' => Some(TypeSig::Boolean),
            b'B' => Some(TypeSig::Byte),
            b'C' => Some(TypeSig::Char),
            b'S' => Some(TypeSig::Short),
            b'I' => Some(TypeSig::Int),
            b'J' => Some(TypeSig::Long),
            b'F' => Some(TypeSig::Float),
            b'D' => Some(TypeSig::Double),
            b'V' => Some(TypeSig::Void),
            b'L' => {
                let start = self.pos;
                while self.peek()? != b';' {
                    self.pos += 1;
                }
                let name = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
                self.pos += 1;
                Some(TypeSig::Object(name.to_string()))
            }
            b'[' => Some(TypeSig::Array(Box::new(self.read_type()?))),
            _ => None,
        }
    }
}

/// Parse a single field/type descriptor.
pub fn parse_type(desc: &str) -> Result<TypeSig, DecodeError> {
    SigReader::new(desc)
        .read_type()
        .ok_or_else(|| DecodeError::BadDescriptor(desc.to_string()))
}

/// Parse a method descriptor such as `(ILjava/lang/String;)V`.
pub fn parse_method(desc: &str) -> Result<MethodSig, DecodeError> {
    let bad = || DecodeError::BadDescriptor(desc.to_string());
    let mut reader = SigReader::new(desc);
    if reader.bump() != Some(b'(') {
        return Err(bad());
    }
    let mut params = Vec::new();
    loop {
        match reader.peek() {
            Some(b')') => {
                reader.pos += 1;
                break;
            }
            Some(_) => params.push(reader.read_type().ok_or_else(bad)?),
            None => return Err(bad()),
        }
    }
    let ret = reader.read_type().ok_or_else(bad)?;
    Ok(MethodSig { params, ret })
}

/// The element type for a `newarray` type code.
pub fn newarray_type(atype: u8) -> Option<TypeSig> {
    match atype {
        4 => Some(TypeSig::Boolean),
        5 => Some(TypeSig::Char),
        6 => Some(TypeSig::Float),
        7 => Some(TypeSig::Double),
        8 => Some(TypeSig::Byte),
        9 => Some(TypeSig::Short),
        10 => Some(TypeSig::Int),
        11 => Some(TypeSig::Long),
        _ => None,
    }
}

/// Unqualified form of an internal class name.
pub fn simple_name(internal: &str) -> &str {
    match internal.rfind('/') {
        Some(pos) => &internal[pos + 1..],
        None => internal,
    }
}

/// Internal name with `/` replaced by `.`.
pub fn source_class_name(internal: &str) -> String {
    internal.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_primitives() {
        assert_eq!(parse_type("I").unwrap(), TypeSig::Int);
        assert_eq!(parse_type("J").unwrap(), TypeSig::Long);
        assert_eq!(parse_type("Z").unwrap(), TypeSig::Boolean);
        assert_eq!(parse_type("V").unwrap(), TypeSig::Void);
    }

    #[test]
    fn parse_reference_and_array() {
        assert_eq!(
            parse_type("Ljava/lang/String;").unwrap(),
            TypeSig::Object("java/lang/String".into())
        );
        assert_eq!(
            parse_type("[[I").unwrap(),
            TypeSig::Array(Box::new(TypeSig::Array(Box::new(TypeSig::Int))))
        );
    }

    #[test]
    fn parse_method_descriptors() {
        let sig = parse_method("(II)I").unwrap();
        assert_eq!(sig.params, vec![TypeSig::Int, TypeSig::Int]);
        assert_eq!(sig.ret, TypeSig::Int);
        assert!(sig.returns_value());

        let sig = parse_method("(Ljava/lang/String;[B)V").unwrap();
        assert_eq!(sig.param_count(), 2);
        assert!(!sig.returns_value());

        let sig = parse_method("()V").unwrap();
        assert!(sig.params.is_empty());
    }

    #[test]
    fn reject_malformed() {
        assert!(parse_method("II)V").is_err());
        assert!(parse_method("(Q)V").is_err());
        assert!(parse_type("Ljava/lang/String").is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(TypeSig::Object("java/lang/String".into()).source_name(), "String");
        assert_eq!(
            TypeSig::Array(Box::new(TypeSig::Int)).source_name(),
            "int[]"
        );
        assert_eq!(source_class_name("java/util/List"), "java.util.List");
    }
}
