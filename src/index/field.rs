//! Single-field indexers. Each one pairs an accessor closure over the
//! record type with one of the order-preserving encodings from
//! [`crate::encoding::key`].

use uuid::Uuid;

use super::{single_arg, Arg, Indexer, Keys};
use crate::encoding::key;
use crate::error::{Error, Result};

type Access<R, T> = Box<dyn Fn(&R) -> T + Send + Sync>;

fn encode_str(s: &str, lowercase: bool, terminated: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() + 1);
    let folded;
    let s = if lowercase {
        folded = s.to_lowercase();
        folded.as_str()
    } else {
        s
    };
    if terminated {
        key::encode_str_to(s, &mut buf);
    } else {
        key::encode_str_prefix_to(s, &mut buf);
    }
    buf
}

/// Indexes a string field, terminated with the `0x00` sentinel. An
/// absent or empty string means the record is not indexed.
pub struct StringField<R> {
    access: Box<dyn for<'r> Fn(&'r R) -> Option<&'r str> + Send + Sync>,
    lowercase: bool,
}

impl<R> StringField<R> {
    pub fn new(access: impl for<'r> Fn(&'r R) -> Option<&'r str> + Send + Sync + 'static) -> Self {
        Self {
            access: Box::new(access),
            lowercase: false,
        }
    }

    /// Folds both stored and queried values to lowercase.
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    fn encode(&self, s: &str, terminated: bool) -> Vec<u8> {
        encode_str(s, self.lowercase, terminated)
    }
}

impl<R> Indexer<R> for StringField<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        match (self.access)(record) {
            Some(s) if !s.is_empty() => Ok(Keys::One(self.encode(s, true))),
            _ => Ok(Keys::Missing),
        }
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => Ok(self.encode(s, true)),
            other => Err(Error::ArgMismatch(format!(
                "expected a string argument, got {}",
                other.kind()
            ))),
        }
    }

    fn prefix_from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => Ok(self.encode(s, false)),
            other => Err(Error::ArgMismatch(format!(
                "expected a string argument, got {}",
                other.kind()
            ))),
        }
    }

    fn supports_prefix(&self) -> bool {
        true
    }
}

/// Multi-value string index: the record is indexed once per element.
/// An empty slice means the record is not indexed.
pub struct StringSliceField<R> {
    access: Box<dyn for<'r> Fn(&'r R) -> &'r [String] + Send + Sync>,
    lowercase: bool,
}

impl<R> StringSliceField<R> {
    pub fn new(access: impl for<'r> Fn(&'r R) -> &'r [String] + Send + Sync + 'static) -> Self {
        Self {
            access: Box::new(access),
            lowercase: false,
        }
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    fn encode(&self, s: &str, terminated: bool) -> Vec<u8> {
        encode_str(s, self.lowercase, terminated)
    }
}

impl<R> Indexer<R> for StringSliceField<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        let values = (self.access)(record);
        let keys: Vec<Vec<u8>> = values
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| self.encode(s, true))
            .collect();
        if keys.is_empty() {
            Ok(Keys::Missing)
        } else {
            Ok(Keys::Many(keys))
        }
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => Ok(self.encode(s, true)),
            other => Err(Error::ArgMismatch(format!(
                "expected a string argument, got {}",
                other.kind()
            ))),
        }
    }

    fn prefix_from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => Ok(self.encode(s, false)),
            other => Err(Error::ArgMismatch(format!(
                "expected a string argument, got {}",
                other.kind()
            ))),
        }
    }

    fn supports_prefix(&self) -> bool {
        true
    }
}

/// Indexes a signed integer field at a fixed width (1, 2, 4 or 8 bytes),
/// big-endian with the sign bit flipped so byte order matches numeric
/// order.
pub struct IntField<R> {
    access: Access<R, i64>,
    width: usize,
}

impl<R> IntField<R> {
    /// Panics on an unsupported width; the width is part of the schema,
    /// not runtime input.
    pub fn new(width: usize, access: impl Fn(&R) -> i64 + Send + Sync + 'static) -> Self {
        assert!(
            matches!(width, 1 | 2 | 4 | 8),
            "integer index width must be 1, 2, 4 or 8"
        );
        Self {
            access: Box::new(access),
            width,
        }
    }
}

impl<R> Indexer<R> for IntField<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        let mut buf = Vec::with_capacity(self.width);
        key::encode_int_to((self.access)(record), self.width, &mut buf)?;
        Ok(Keys::One(buf))
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Int(v) => {
                let mut buf = Vec::with_capacity(self.width);
                key::encode_int_to(*v, self.width, &mut buf)?;
                Ok(buf)
            }
            other => Err(Error::ArgMismatch(format!(
                "expected an int argument, got {}",
                other.kind()
            ))),
        }
    }
}

/// Unsigned counterpart of [`IntField`].
pub struct UintField<R> {
    access: Access<R, u64>,
    width: usize,
}

impl<R> UintField<R> {
    pub fn new(width: usize, access: impl Fn(&R) -> u64 + Send + Sync + 'static) -> Self {
        assert!(
            matches!(width, 1 | 2 | 4 | 8),
            "integer index width must be 1, 2, 4 or 8"
        );
        Self {
            access: Box::new(access),
            width,
        }
    }
}

impl<R> Indexer<R> for UintField<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        let mut buf = Vec::with_capacity(self.width);
        key::encode_uint_to((self.access)(record), self.width, &mut buf)?;
        Ok(Keys::One(buf))
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::UInt(v) => {
                let mut buf = Vec::with_capacity(self.width);
                key::encode_uint_to(*v, self.width, &mut buf)?;
                Ok(buf)
            }
            other => Err(Error::ArgMismatch(format!(
                "expected a uint argument, got {}",
                other.kind()
            ))),
        }
    }
}

/// One-byte boolean index.
pub struct BoolField<R> {
    access: Access<R, bool>,
}

impl<R> BoolField<R> {
    pub fn new(access: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        Self {
            access: Box::new(access),
        }
    }
}

impl<R> Indexer<R> for BoolField<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        let mut buf = Vec::with_capacity(1);
        key::encode_bool_to((self.access)(record), &mut buf);
        Ok(Keys::One(buf))
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Bool(v) => {
                let mut buf = Vec::with_capacity(1);
                key::encode_bool_to(*v, &mut buf);
                Ok(buf)
            }
            other => Err(Error::ArgMismatch(format!(
                "expected a bool argument, got {}",
                other.kind()
            ))),
        }
    }
}

/// UUID index storing the 16 raw bytes. Query arguments may be a
/// [`Uuid`] value, 16 binary bytes, or the 36-character hyphenated
/// textual form.
pub struct UuidField<R> {
    access: Access<R, Option<Uuid>>,
}

impl<R> UuidField<R> {
    pub fn new(access: impl Fn(&R) -> Option<Uuid> + Send + Sync + 'static) -> Self {
        Self {
            access: Box::new(access),
        }
    }

    fn arg_to_uuid(arg: &Arg<'_>) -> Result<Uuid> {
        match arg {
            Arg::Uuid(v) => Ok(*v),
            Arg::Bytes(b) => Uuid::from_slice(b).map_err(|_| {
                Error::ArgMismatch(format!("expected 16 uuid bytes, got {} bytes", b.len()))
            }),
            Arg::Str(s) if s.len() == 36 => Uuid::parse_str(s)
                .map_err(|err| Error::ArgMismatch(format!("invalid uuid text '{s}': {err}"))),
            Arg::Str(s) => Err(Error::ArgMismatch(format!(
                "uuid text must be the 36-character hyphenated form, got {} characters",
                s.len()
            ))),
            other => Err(Error::ArgMismatch(format!(
                "expected a uuid argument, got {}",
                other.kind()
            ))),
        }
    }
}

impl<R> Indexer<R> for UuidField<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        match (self.access)(record) {
            Some(id) => {
                let mut buf = Vec::with_capacity(16);
                key::encode_uuid_to(&id, &mut buf);
                Ok(Keys::One(buf))
            }
            None => Ok(Keys::Missing),
        }
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        let id = Self::arg_to_uuid(single_arg(args)?)?;
        let mut buf = Vec::with_capacity(16);
        key::encode_uuid_to(&id, &mut buf);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        email: String,
        nickname: Option<String>,
        tags: Vec<String>,
        age: i64,
        active: bool,
        device: Option<Uuid>,
    }

    fn joe() -> Person {
        Person {
            email: "joe@aol.com".into(),
            nickname: None,
            tags: vec!["admin".into(), "ops".into()],
            age: 30,
            active: true,
            device: Some(Uuid::parse_str("67dd34a1-8d1f-46e7-a4f1-5bd0dbb2cc5a").unwrap()),
        }
    }

    #[test]
    fn string_field_terminates_and_matches_args() {
        let ix = StringField::new(|p: &Person| Some(p.email.as_str()));
        let keys = ix.from_record(&joe()).unwrap();
        assert_eq!(keys, Keys::One(b"joe@aol.com\x00".to_vec()));
        let arg_key = ix.from_args(&[Arg::Str("joe@aol.com")]).unwrap();
        assert_eq!(Keys::One(arg_key), keys);
    }

    #[test]
    fn string_field_reports_missing_for_absent_or_empty() {
        let ix = StringField::new(|p: &Person| p.nickname.as_deref());
        assert!(ix.from_record(&joe()).unwrap().is_missing());

        let mut p = joe();
        p.nickname = Some(String::new());
        assert!(ix.from_record(&p).unwrap().is_missing());
    }

    #[test]
    fn string_field_lowercase_folds_both_sides() {
        let ix = StringField::new(|p: &Person| Some(p.email.as_str())).lowercase();
        let mut p = joe();
        p.email = "Joe@AOL.com".into();
        assert_eq!(
            ix.from_record(&p).unwrap(),
            Keys::One(b"joe@aol.com\x00".to_vec())
        );
        assert_eq!(
            ix.from_args(&[Arg::Str("JOE@aol.COM")]).unwrap(),
            b"joe@aol.com\x00".to_vec()
        );
    }

    #[test]
    fn string_field_prefix_omits_sentinel() {
        let ix = StringField::new(|p: &Person| Some(p.email.as_str()));
        assert_eq!(ix.prefix_from_args(&[Arg::Str("joe")]).unwrap(), b"joe");
        assert!(ix.supports_prefix());
    }

    #[test]
    fn string_field_rejects_wrong_arg_shape() {
        let ix = StringField::new(|p: &Person| Some(p.email.as_str()));
        assert!(matches!(
            ix.from_args(&[Arg::Int(1)]),
            Err(Error::ArgMismatch(_))
        ));
        assert!(matches!(
            ix.from_args(&[Arg::Str("a"), Arg::Str("b")]),
            Err(Error::ArgMismatch(_))
        ));
    }

    #[test]
    fn string_slice_field_emits_one_key_per_element() {
        let ix = StringSliceField::new(|p: &Person| p.tags.as_slice());
        match ix.from_record(&joe()).unwrap() {
            Keys::Many(keys) => {
                assert_eq!(keys, vec![b"admin\x00".to_vec(), b"ops\x00".to_vec()]);
            }
            other => panic!("expected Many, got {other:?}"),
        }

        let mut p = joe();
        p.tags.clear();
        assert!(ix.from_record(&p).unwrap().is_missing());
    }

    #[test]
    fn int_field_orders_negative_before_positive() {
        let ix = IntField::new(8, |p: &Person| p.age);
        let mut young = joe();
        young.age = -3;
        let neg = ix.from_record(&young).unwrap();
        let pos = ix.from_record(&joe()).unwrap();
        match (neg, pos) {
            (Keys::One(a), Keys::One(b)) => assert!(a < b),
            other => panic!("expected One keys, got {other:?}"),
        }
    }

    #[test]
    fn uuid_field_accepts_all_three_arg_forms() {
        let ix = UuidField::new(|p: &Person| p.device);
        let id = joe().device.unwrap();
        let from_value = ix.from_args(&[Arg::Uuid(id)]).unwrap();
        let from_bytes = ix.from_args(&[Arg::Bytes(id.as_bytes())]).unwrap();
        let from_text = ix
            .from_args(&[Arg::Str("67dd34a1-8d1f-46e7-a4f1-5bd0dbb2cc5a")])
            .unwrap();
        assert_eq!(from_value, from_bytes);
        assert_eq!(from_value, from_text);
        assert_eq!(from_value.len(), 16);
    }

    #[test]
    fn uuid_field_rejects_unhyphenated_text_and_short_bytes() {
        let ix = UuidField::new(|p: &Person| p.device);
        assert!(matches!(
            ix.from_args(&[Arg::Str("67dd34a18d1f46e7a4f15bd0dbb2cc5a")]),
            Err(Error::ArgMismatch(_))
        ));
        assert!(matches!(
            ix.from_args(&[Arg::Bytes(&[1, 2, 3])]),
            Err(Error::ArgMismatch(_))
        ));
    }

    #[test]
    fn bool_field_encodes_one_byte() {
        let ix = BoolField::new(|p: &Person| p.active);
        assert_eq!(ix.from_record(&joe()).unwrap(), Keys::One(vec![0x01]));
        assert_eq!(ix.from_args(&[Arg::Bool(false)]).unwrap(), vec![0x00]);
    }
}
