//! # Cache Keys
//!
//! Argument capabilities and the key type stored in every memo table.
//!
//! Each argument type declares statically whether it can be used as a key directly.
//! [`KeyArg::key_part`] is that capability query: scalars answer with a [`KeyPart`],
//! containers and user types answer `None` and are routed through the serialization
//! fallback. The query never fails, so no error is used for routine control flow.
//!
//! ```
//! use memoizo_core::{Arguments, Call, Component, KeyArg, KeyPart};
//!
//! assert_eq!(7u8.key_part(), Some(KeyPart::UInt(7)));
//! assert_eq!(vec![1, 2].key_part(), None);
//!
//! let call = Call::new((1, "x")).kw("scale", 2.5);
//! assert_eq!(call.positional().len(), 2);
//! assert!(call.keywords().is_some());
//! assert!(matches!(call.positional()[0], Component::Direct(_)));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::canonical;

/// A structurally comparable component of a direct cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Unit,
    Bool(bool),
    Int(i128),
    UInt(u128),
    /// Floats compare by bit pattern, so `NaN` matches itself and `-0.0 != 0.0`.
    Float(u64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    Option(Option<Box<KeyPart>>),
    Tuple(Vec<KeyPart>),
    /// A keyword argument folded into the key as `name = value`.
    Keyword(String, Box<KeyPart>),
    /// A method receiver, compared by identity.
    Instance(InstanceRef),
}

impl KeyPart {
    /// Lowers the part into its canonical serialized form.
    ///
    /// Receivers met on the way are pushed onto `pins`.
    pub(crate) fn to_canonical(&self, pins: &mut Vec<InstanceRef>) -> Value {
        match self {
            KeyPart::Unit => canonical::unit(),
            KeyPart::Bool(b) => canonical::boolean(*b),
            KeyPart::Int(i) => canonical::int(*i),
            KeyPart::UInt(u) => canonical::uint(*u),
            KeyPart::Float(bits) => canonical::float(*bits),
            KeyPart::Char(c) => canonical::character(*c),
            KeyPart::Str(s) => canonical::string(s),
            KeyPart::Bytes(bytes) => canonical::bytes(bytes),
            KeyPart::Option(None) => canonical::none(),
            KeyPart::Option(Some(inner)) => canonical::some(inner.to_canonical(pins)),
            KeyPart::Tuple(parts) => {
                canonical::seq(parts.iter().map(|p| p.to_canonical(pins)).collect())
            }
            KeyPart::Keyword(name, inner) => canonical::keyword(name, inner.to_canonical(pins)),
            KeyPart::Instance(instance) => {
                pins.push(instance.clone());
                canonical::instance(instance.addr())
            }
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Unit => write!(f, "()"),
            KeyPart::Bool(b) => write!(f, "{b}"),
            KeyPart::Int(i) => write!(f, "{i}"),
            KeyPart::UInt(u) => write!(f, "{u}"),
            KeyPart::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            KeyPart::Char(c) => write!(f, "{c:?}"),
            KeyPart::Str(s) => write!(f, "{s:?}"),
            KeyPart::Bytes(bytes) => write!(f, "b{bytes:?}"),
            KeyPart::Option(None) => write!(f, "None"),
            KeyPart::Option(Some(inner)) => write!(f, "Some({inner})"),
            KeyPart::Tuple(parts) => {
                write!(f, "(")?;
                write_joined(f, parts)?;
                write!(f, ")")
            }
            KeyPart::Keyword(name, inner) => write!(f, "{name}={inner}"),
            KeyPart::Instance(instance) => write!(f, "{instance:?}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[KeyPart]) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{part}")?;
    }
    Ok(())
}

/// Identity handle for a method receiver.
///
/// Two handles are equal only when they point at the same allocation. The handle keeps
/// the receiver alive, so an address cannot be reused by another object while a cache
/// entry still refers to it.
#[derive(Clone)]
pub struct InstanceRef(Arc<dyn Any + Send + Sync>);

impl InstanceRef {
    pub fn new<S: Send + Sync + 'static>(instance: &Arc<S>) -> Self {
        let erased: Arc<dyn Any + Send + Sync> = instance.clone();
        Self(erased)
    }

    /// Address of the receiver allocation.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for InstanceRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for InstanceRef {}

impl Hash for InstanceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({:#x})", self.addr())
    }
}

/// One argument lowered for key derivation.
#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    /// Usable as a direct key.
    Direct(KeyPart),
    /// Needs the serialization fallback. Holds the serialized form, or the reason
    /// serialization failed.
    Structured(Result<Value, String>),
}

impl Component {
    pub fn is_direct(&self) -> bool {
        matches!(self, Component::Direct(_))
    }

    pub fn as_direct(&self) -> Option<&KeyPart> {
        match self {
            Component::Direct(part) => Some(part),
            Component::Structured(_) => None,
        }
    }

    /// The canonical serialized form used by fallback keys.
    pub(crate) fn to_canonical(&self, pins: &mut Vec<InstanceRef>) -> Result<Value, String> {
        match self {
            Component::Direct(part) => Ok(part.to_canonical(pins)),
            Component::Structured(encoded) => encoded.clone(),
        }
    }
}

/// Capability of a single argument type to take part in a cache key.
///
/// Types with a direct key override [`key_part`](KeyArg::key_part). Everything else
/// keeps the default and is keyed by its canonical serialized form, in which values of
/// different kinds never compare equal and map entries are sorted:
///
/// ```
/// use memoizo_core::{Component, KeyArg, KeyPart};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl KeyArg for Point {}
///
/// #[derive(Serialize)]
/// struct UserId(u64);
///
/// impl KeyArg for UserId {
///     fn key_part(&self) -> Option<KeyPart> {
///         Some(KeyPart::UInt(self.0 as u128))
///     }
/// }
///
/// assert!(matches!(Point { x: 1, y: 2 }.component(), Component::Structured(Ok(_))));
/// assert_eq!(UserId(9).component(), Component::Direct(KeyPart::UInt(9)));
/// ```
///
/// Standard collections compose the components of their elements, and `HashSet`s are
/// sorted at any depth. A user type is encoded through its `Serialize` impl instead,
/// which presents a `HashSet` field as a plain sequence in iteration order: give such
/// fields a `BTreeSet`, or override [`component`](KeyArg::component).
pub trait KeyArg: Serialize {
    /// Returns the direct key form, or `None` when the argument must be serialized.
    fn key_part(&self) -> Option<KeyPart> {
        None
    }

    fn component(&self) -> Component {
        match self.key_part() {
            Some(part) => Component::Direct(part),
            None => Component::Structured(canonical::encode(self)),
        }
    }
}

impl<T: KeyArg + ?Sized> KeyArg for &T {
    fn key_part(&self) -> Option<KeyPart> {
        (**self).key_part()
    }

    fn component(&self) -> Component {
        (**self).component()
    }
}

/// A complete argument set: ordered positional arguments plus optional keywords.
pub trait Arguments {
    fn positional(&self) -> Vec<Component>;

    fn keywords(&self) -> Option<&Kwargs> {
        None
    }
}

impl Arguments for () {
    fn positional(&self) -> Vec<Component> {
        Vec::new()
    }
}

// Scalars are keys by themselves and may also be passed as a lone argument.
macro_rules! scalar_key_arg {
    ($($t:ty => |$v:ident| $part:expr),* $(,)?) => {
        $(
            impl KeyArg for $t {
                fn key_part(&self) -> Option<KeyPart> {
                    let $v = self;
                    Some($part)
                }
            }

            impl Arguments for $t {
                fn positional(&self) -> Vec<Component> {
                    vec![self.component()]
                }
            }
        )*
    };
}

scalar_key_arg! {
    i8 => |v| KeyPart::Int(*v as i128),
    i16 => |v| KeyPart::Int(*v as i128),
    i32 => |v| KeyPart::Int(*v as i128),
    i64 => |v| KeyPart::Int(*v as i128),
    i128 => |v| KeyPart::Int(*v),
    isize => |v| KeyPart::Int(*v as i128),
    u8 => |v| KeyPart::UInt(*v as u128),
    u16 => |v| KeyPart::UInt(*v as u128),
    u32 => |v| KeyPart::UInt(*v as u128),
    u64 => |v| KeyPart::UInt(*v as u128),
    u128 => |v| KeyPart::UInt(*v),
    usize => |v| KeyPart::UInt(*v as u128),
    f32 => |v| KeyPart::Float((*v as f64).to_bits()),
    f64 => |v| KeyPart::Float(v.to_bits()),
    bool => |v| KeyPart::Bool(*v),
    char => |v| KeyPart::Char(*v),
    String => |v| KeyPart::Str(v.clone()),
}

impl KeyArg for () {
    fn key_part(&self) -> Option<KeyPart> {
        Some(KeyPart::Unit)
    }
}

impl KeyArg for str {
    fn key_part(&self) -> Option<KeyPart> {
        Some(KeyPart::Str(self.to_owned()))
    }
}

impl Arguments for &str {
    fn positional(&self) -> Vec<Component> {
        vec![self.component()]
    }
}

impl<T: KeyArg> KeyArg for Option<T> {
    fn key_part(&self) -> Option<KeyPart> {
        match self {
            None => Some(KeyPart::Option(None)),
            Some(value) => value
                .key_part()
                .map(|part| KeyPart::Option(Some(Box::new(part)))),
        }
    }

    fn component(&self) -> Component {
        match self {
            None => Component::Direct(KeyPart::Option(None)),
            Some(value) => match value.component() {
                Component::Direct(part) => {
                    Component::Direct(KeyPart::Option(Some(Box::new(part))))
                }
                Component::Structured(encoded) => {
                    Component::Structured(encoded.map(canonical::some))
                }
            },
        }
    }
}

// Receivers nested inside a collection are encoded by address but not pinned.
fn encode_all<'a, T: KeyArg + 'a>(
    items: impl IntoIterator<Item = &'a T>,
) -> Result<Vec<Value>, String> {
    let mut pins = Vec::new();
    items
        .into_iter()
        .map(|item| item.component().to_canonical(&mut pins))
        .collect()
}

fn encode_entries<'a, K: KeyArg + 'a, V: KeyArg + 'a>(
    entries: impl IntoIterator<Item = (&'a K, &'a V)>,
) -> Result<Vec<(Value, Value)>, String> {
    let mut pins = Vec::new();
    entries
        .into_iter()
        .map(|(key, value)| -> Result<(Value, Value), String> {
            Ok((
                key.component().to_canonical(&mut pins)?,
                value.component().to_canonical(&mut pins)?,
            ))
        })
        .collect()
}

// Containers are mutable collections: never a direct key.
impl<T: KeyArg> KeyArg for [T] {
    fn component(&self) -> Component {
        Component::Structured(encode_all(self).map(canonical::seq))
    }
}

impl<T: KeyArg> KeyArg for Vec<T> {
    fn component(&self) -> Component {
        Component::Structured(encode_all(self).map(canonical::seq))
    }
}

impl<T: KeyArg> KeyArg for VecDeque<T> {
    fn component(&self) -> Component {
        Component::Structured(encode_all(self).map(canonical::seq))
    }
}

impl<T: KeyArg, const N: usize> KeyArg for [T; N]
where
    [T; N]: Serialize,
{
    fn component(&self) -> Component {
        Component::Structured(encode_all(self).map(canonical::seq))
    }
}

impl<T: KeyArg + Ord> KeyArg for BTreeSet<T> {
    fn component(&self) -> Component {
        Component::Structured(encode_all(self).map(canonical::set))
    }
}

// Iteration order differs between equal sets, so elements are sorted by their encoding.
impl<T, S> KeyArg for HashSet<T, S>
where
    HashSet<T, S>: Serialize,
    T: KeyArg,
{
    fn component(&self) -> Component {
        Component::Structured(encode_all(self).map(canonical::set))
    }
}

impl<K: KeyArg, V: KeyArg> KeyArg for BTreeMap<K, V>
where
    BTreeMap<K, V>: Serialize,
{
    fn component(&self) -> Component {
        Component::Structured(encode_entries(self).map(canonical::map))
    }
}

impl<K: KeyArg, V: KeyArg, S> KeyArg for HashMap<K, V, S>
where
    HashMap<K, V, S>: Serialize,
{
    fn component(&self) -> Component {
        Component::Structured(encode_entries(self).map(canonical::map))
    }
}

macro_rules! container_arguments {
    ($($t:ident<$($p:ident),+>;)*) => {
        $(
            impl<$($p),+> Arguments for $t<$($p),+>
            where
                $t<$($p),+>: KeyArg,
            {
                fn positional(&self) -> Vec<Component> {
                    vec![self.component()]
                }
            }
        )*
    };
}

container_arguments! {
    Vec<T>;
    VecDeque<T>;
    BTreeSet<T>;
    BTreeMap<K, V>;
    HashMap<K, V, S>;
    HashSet<T, S>;
}

macro_rules! tuple_arguments {
    ($($name:ident),+) => {
        impl<$($name: KeyArg),+> Arguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn positional(&self) -> Vec<Component> {
                let ($($name,)+) = self;
                vec![$($name.component()),+]
            }
        }
    };
}

macro_rules! tuple_key_arg {
    ($($name:ident),+) => {
        impl<$($name: KeyArg),+> KeyArg for ($($name,)+) {
            #[allow(non_snake_case)]
            fn key_part(&self) -> Option<KeyPart> {
                let ($($name,)+) = self;
                Some(KeyPart::Tuple(vec![$($name.key_part()?),+]))
            }

            #[allow(non_snake_case)]
            fn component(&self) -> Component {
                let ($($name,)+) = self;
                let parts = vec![$($name.component()),+];
                let direct: Option<Vec<KeyPart>> =
                    parts.iter().map(|part| part.as_direct().cloned()).collect();
                match direct {
                    Some(direct) => Component::Direct(KeyPart::Tuple(direct)),
                    None => {
                        let mut pins = Vec::new();
                        Component::Structured(
                            parts
                                .iter()
                                .map(|part| part.to_canonical(&mut pins))
                                .collect::<Result<Vec<_>, _>>()
                                .map(canonical::seq),
                        )
                    }
                }
            }
        }
    };
}

tuple_key_arg!(A);
tuple_key_arg!(A, B);
tuple_key_arg!(A, B, C);
tuple_key_arg!(A, B, C, D);
tuple_key_arg!(A, B, C, D, E);
tuple_key_arg!(A, B, C, D, E, F);
tuple_key_arg!(A, B, C, D, E, F, G);
tuple_key_arg!(A, B, C, D, E, F, G, H);

tuple_arguments!(A);
tuple_arguments!(A, B);
tuple_arguments!(A, B, C);
tuple_arguments!(A, B, C, D);
tuple_arguments!(A, B, C, D, E);
tuple_arguments!(A, B, C, D, E, F);
tuple_arguments!(A, B, C, D, E, F, G);
tuple_arguments!(A, B, C, D, E, F, G, H);

#[derive(Clone, Debug)]
struct Keyword {
    component: Component,
    value: Result<Value, String>,
}

/// Keyword arguments of a call, kept sorted by name.
#[derive(Clone, Debug, Default)]
pub struct Kwargs {
    entries: BTreeMap<String, Keyword>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a keyword argument.
    pub fn with<T: KeyArg>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: KeyArg>(&mut self, name: impl Into<String>, value: T) {
        let component = value.component();
        let value = serde_json::to_value(&value).map_err(|e| e.to_string());
        self.entries
            .insert(name.into(), Keyword { component, value });
    }

    /// Reads a keyword back as `T`.
    ///
    /// Returns `None` when the keyword is absent or does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.entries.get(name)?.value.as_ref().ok()?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keyword names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, component)` pairs in sorted order.
    pub fn components(&self) -> impl Iterator<Item = (&str, &Component)> {
        self.entries
            .iter()
            .map(|(name, keyword)| (name.as_str(), &keyword.component))
    }
}

/// Positional arguments `P` together with keyword arguments.
///
/// A `Call` without keywords derives the same key as `P` on its own.
#[derive(Clone, Debug)]
pub struct Call<P> {
    pub args: P,
    pub kwargs: Kwargs,
}

impl<P> Call<P> {
    pub fn new(args: P) -> Self {
        Self {
            args,
            kwargs: Kwargs::new(),
        }
    }

    pub fn with_kwargs(args: P, kwargs: Kwargs) -> Self {
        Self { args, kwargs }
    }

    /// Adds a keyword argument.
    pub fn kw<T: KeyArg>(mut self, name: impl Into<String>, value: T) -> Self {
        self.kwargs.insert(name, value);
        self
    }

    /// Reads a keyword argument, falling back to `default` when it is absent.
    pub fn kw_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.kwargs.get(name).unwrap_or(default)
    }
}

impl<P: Arguments> Arguments for Call<P> {
    fn positional(&self) -> Vec<Component> {
        self.args.positional()
    }

    fn keywords(&self) -> Option<&Kwargs> {
        if self.kwargs.is_empty() {
            None
        } else {
            Some(&self.kwargs)
        }
    }
}

/// Key of one memo table entry.
#[derive(Clone, Debug)]
pub enum CacheKey {
    /// Fast path: the argument parts themselves, compared structurally.
    Direct(Vec<KeyPart>),
    /// Fallback path: canonical serialized bytes. Only `bytes` take part in equality
    /// and hashing; `pins` keep receivers referenced by the bytes alive.
    Serialized {
        bytes: Vec<u8>,
        pins: Vec<InstanceRef>,
    },
}

impl CacheKey {
    pub fn is_direct(&self) -> bool {
        matches!(self, CacheKey::Direct(_))
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CacheKey::Direct(a), CacheKey::Direct(b)) => a == b,
            (CacheKey::Serialized { bytes: a, .. }, CacheKey::Serialized { bytes: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CacheKey::Direct(parts) => {
                0u8.hash(state);
                parts.hash(state);
            }
            CacheKey::Serialized { bytes, .. } => {
                1u8.hash(state);
                bytes.hash(state);
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Direct(parts) => {
                write!(f, "(")?;
                write_joined(f, parts)?;
                write!(f, ")")
            }
            CacheKey::Serialized { bytes, .. } => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Serialize, Serializer};
    use serde_json::json;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_scalars_are_direct() {
        assert_eq!(5i32.key_part(), Some(KeyPart::Int(5)));
        assert_eq!(5u64.key_part(), Some(KeyPart::UInt(5)));
        assert_eq!(true.key_part(), Some(KeyPart::Bool(true)));
        assert_eq!('z'.key_part(), Some(KeyPart::Char('z')));
        assert_eq!("abc".key_part(), Some(KeyPart::Str("abc".to_string())));
        assert_eq!(
            "abc".to_string().key_part(),
            Some(KeyPart::Str("abc".to_string()))
        );
        assert_eq!(().key_part(), Some(KeyPart::Unit));
    }

    #[test]
    fn test_float_parts_compare_by_bits() {
        assert_eq!(f64::NAN.key_part(), f64::NAN.key_part());
        assert_ne!(0.0f64.key_part(), (-0.0f64).key_part());
        assert_eq!(1.5f32.key_part(), 1.5f64.key_part());
    }

    #[test]
    fn test_containers_are_structured() {
        assert_eq!(vec![1, 2].key_part(), None);
        assert_eq!(
            vec![1, 2].component(),
            Component::Structured(Ok(json!(["seq", [["int", "1"], ["int", "2"]]])))
        );

        let mut map = HashMap::new();
        map.insert("a".to_string(), 1);
        assert!(matches!(map.component(), Component::Structured(Ok(_))));
    }

    #[test]
    fn test_option_is_direct_only_when_inner_is() {
        assert_eq!(
            Some(3u8).key_part(),
            Some(KeyPart::Option(Some(Box::new(KeyPart::UInt(3)))))
        );
        assert_eq!(None::<u8>.key_part(), Some(KeyPart::Option(None)));
        assert_eq!(Some(vec![1u8]).key_part(), None);
        assert_eq!(
            Some(vec![1u8]).component(),
            Component::Structured(Ok(json!(["some", ["seq", [["uint", "1"]]]])))
        );
    }

    #[test]
    fn test_nested_options_stay_distinct() {
        let outer = None::<Option<u8>>.component();
        let inner = Some(None::<u8>).component();
        let unit = Some(()).component();
        assert_ne!(outer, inner);
        assert_ne!(inner, unit);
        assert_ne!(unit, ().component());

        assert_ne!(
            vec![None::<Option<u8>>].component(),
            vec![Some(None::<u8>)].component()
        );
    }

    #[test]
    fn test_tuples_are_direct_when_every_element_is() {
        assert_eq!(
            (1u8, 'x').component(),
            Component::Direct(KeyPart::Tuple(vec![KeyPart::UInt(1), KeyPart::Char('x')]))
        );
        assert_eq!((1u8, vec![2u8]).key_part(), None);
        assert_eq!(
            (1u8, vec![2u8]).component(),
            Component::Structured(Ok(json!([
                "seq",
                [["uint", "1"], ["seq", [["uint", "2"]]]]
            ])))
        );
    }

    #[test]
    fn test_user_type_defaults_to_structured() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }
        impl KeyArg for Point {}

        assert_eq!(
            Point { x: 1, y: 2 }.component(),
            Component::Structured(Ok(json!([
                "struct",
                [["x", ["int", "1"]], ["y", ["int", "2"]]]
            ])))
        );
    }

    #[test]
    fn test_non_string_map_keys_are_keyable() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        map.insert(vec![2u8], 2);
        assert!(matches!(map.component(), Component::Structured(Ok(_))));
    }

    #[test]
    fn test_serialize_failure_is_kept_as_reason() {
        struct Handle;

        impl Serialize for Handle {
            fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("handles cannot be serialized"))
            }
        }

        impl KeyArg for Handle {}

        assert_eq!(
            vec![Handle].component(),
            Component::Structured(Err("handles cannot be serialized".to_string()))
        );
    }

    #[test]
    fn test_hash_set_component_is_order_independent() {
        let a: HashSet<i32> = (0..50).collect();
        let b: HashSet<i32> = (0..50).rev().collect();
        assert_eq!(a.component(), b.component());

        let nested_a = vec![(1u8, a.clone())];
        let nested_b = vec![(1u8, b.clone())];
        assert_eq!(nested_a.component(), nested_b.component());

        let mut map_a = HashMap::new();
        map_a.insert("set", a);
        let mut map_b = HashMap::new();
        map_b.insert("set", b);
        assert_eq!(Some(map_a).component(), Some(map_b).component());
    }

    #[test]
    fn test_tuple_arguments_keep_order() {
        let args = (1u8, "two", vec![3]);
        let parts = args.positional();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Component::Direct(KeyPart::UInt(1)));
        assert_eq!(parts[1], Component::Direct(KeyPart::Str("two".to_string())));
        assert!(!parts[2].is_direct());
    }

    #[test]
    fn test_kwargs_sorted_and_readable() {
        let kwargs = Kwargs::new().with("multn", 3).with("addn", 0);
        assert_eq!(kwargs.names().collect::<Vec<_>>(), vec!["addn", "multn"]);
        assert_eq!(kwargs.get::<u64>("multn"), Some(3));
        assert_eq!(kwargs.get::<u64>("missing"), None);
        assert_eq!(kwargs.get::<String>("multn"), None);
    }

    #[test]
    fn test_call_without_keywords_matches_plain_arguments() {
        let call = Call::new(10u64);
        assert!(call.keywords().is_none());
        assert_eq!(call.positional(), 10u64.positional());
        assert_eq!(call.kw_or("multn", 1u64), 1);

        let call = call.kw("multn", 3u64);
        assert_eq!(call.kw_or("multn", 1u64), 3);
        assert_eq!(call.keywords().map(Kwargs::len), Some(1));
    }

    #[test]
    fn test_instance_identity() {
        let a = Arc::new(5);
        let b = Arc::new(5);
        assert_eq!(InstanceRef::new(&a), InstanceRef::new(&a.clone()));
        assert_ne!(InstanceRef::new(&a), InstanceRef::new(&b));
        assert_eq!(
            hash_of(&InstanceRef::new(&a)),
            hash_of(&InstanceRef::new(&a))
        );
    }

    #[test]
    fn test_serialized_key_equality_ignores_pins() {
        let receiver = Arc::new(());
        let a = CacheKey::Serialized {
            bytes: b"[1]".to_vec(),
            pins: vec![InstanceRef::new(&receiver)],
        };
        let b = CacheKey::Serialized {
            bytes: b"[1]".to_vec(),
            pins: Vec::new(),
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, CacheKey::Direct(vec![KeyPart::UInt(1)]));
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::Direct(vec![
            KeyPart::UInt(1),
            KeyPart::Keyword("b".to_string(), Box::new(KeyPart::Str("x".to_string()))),
        ]);
        assert_eq!(key.to_string(), "(1, b=\"x\")");

        let key = CacheKey::Serialized {
            bytes: b"[[1],{}]".to_vec(),
            pins: Vec::new(),
        };
        assert_eq!(key.to_string(), "[[1],{}]");
    }

    #[test]
    fn test_canonical_parts_are_lossless() {
        let mut pins = Vec::new();
        assert_eq!(
            KeyPart::UInt(u128::MAX).to_canonical(&mut pins),
            json!(["uint", u128::MAX.to_string()])
        );
        assert_ne!(
            KeyPart::UInt(u128::MAX).to_canonical(&mut pins),
            KeyPart::Str(u128::MAX.to_string()).to_canonical(&mut pins)
        );
        assert_ne!(
            KeyPart::Float(f64::NAN.to_bits()).to_canonical(&mut pins),
            KeyPart::Str("NaN".to_string()).to_canonical(&mut pins)
        );
        assert_ne!(
            KeyPart::Option(None).to_canonical(&mut pins),
            KeyPart::Unit.to_canonical(&mut pins)
        );
        assert_eq!(KeyPart::Int(-4).to_canonical(&mut pins), json!(["int", "-4"]));
        assert!(pins.is_empty());
    }

    #[test]
    fn test_direct_parts_match_serialized_encoding() {
        let mut pins = Vec::new();
        let direct = (7u8, "x", Some(1.5f32)).component();
        assert!(direct.is_direct());
        assert_eq!(
            direct.to_canonical(&mut pins),
            canonical::encode(&(7u8, "x", Some(1.5f32)))
        );
    }
}
