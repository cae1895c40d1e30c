//! Generator combinators for command arguments and other test data.

use crate::{data::*, tree::*};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fresh draws a filtered generator makes before it reports exhaustion.
pub const FILTER_RETRY_LIMIT: usize = 100;

type GenFn<T> = dyn Fn(Size, Seed) -> Option<Tree<T>> + Send + Sync;

/// A generator for test data of type `T`.
///
/// Generators are explicit, first-class values that can be composed
/// using combinator functions. They are immutable and can be shared
/// between worker threads; only the trees they produce are thread-local.
///
/// A generator may come up empty (`None`) when a filter cannot be
/// satisfied; callers treat this as generation exhaustion.
pub struct Gen<T> {
    generator: Arc<GenFn<T>>,
}

impl<T> Clone for Gen<T> {
    fn clone(&self) -> Self {
        Gen {
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<T: 'static> Gen<T> {
    /// Create a new generator from a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Size, Seed) -> Tree<T> + Send + Sync + 'static,
    {
        Gen::partial(move |size, seed| Some(f(size, seed)))
    }

    /// Create a generator that may fail to produce a value.
    pub fn partial<F>(f: F) -> Self
    where
        F: Fn(Size, Seed) -> Option<Tree<T>> + Send + Sync + 'static,
    {
        Gen {
            generator: Arc::new(f),
        }
    }

    /// Generate a value and its shrink tree using the given size and seed.
    pub fn generate(&self, size: Size, seed: Seed) -> Option<Tree<T>> {
        (self.generator)(size, seed)
    }

    /// Generate just a value, discarding its shrinks.
    pub fn sample(&self, size: Size, seed: Seed) -> Option<T> {
        self.generate(size, seed).map(|tree| tree.value)
    }

    /// Create a generator that always produces the same value.
    pub fn constant(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Gen::new(move |_size, _seed| Tree::singleton(value.clone()))
    }

    /// Map a function over the generated values.
    pub fn map<U, F>(self, f: F) -> Gen<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Gen::partial(move |size, seed| {
            let f = Arc::clone(&f);
            self.generate(size, seed)
                .map(|tree| tree.map(move |value| f(value)))
        })
    }

    /// Bind/flatmap for dependent generation.
    pub fn bind<U, F>(self, f: F) -> Gen<U>
    where
        U: 'static,
        F: Fn(T) -> Gen<U> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Gen::partial(move |size, seed| {
            let (seed1, seed2) = seed.split();
            let tree = self.generate(size, seed1)?;
            let f = Arc::clone(&f);
            tree.bind(move |value| f(value).generate(size, seed2))
        })
    }

    /// Restrict generated values to those satisfying `predicate`.
    ///
    /// Each call draws up to [`FILTER_RETRY_LIMIT`] candidates from fresh
    /// seeds and yields `None` if none of them qualifies. Shrinks that
    /// violate the predicate are pruned.
    pub fn filter<F>(self, predicate: F) -> Gen<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Gen::partial(move |size, seed| {
            let mut seed = seed;
            for _ in 0..FILTER_RETRY_LIMIT {
                let (attempt, next) = seed.split();
                seed = next;
                if let Some(tree) = self.generate(size, attempt) {
                    let predicate = Arc::clone(&predicate);
                    if let Some(tree) = tree.filter(move |value| predicate(value)) {
                        return Some(tree);
                    }
                }
            }
            None
        })
    }

    /// Generate two values independently and pair them.
    pub fn zip<U>(self, other: Gen<U>) -> Gen<(T, U)>
    where
        T: Clone,
        U: Clone + 'static,
    {
        Gen::partial(move |size, seed| {
            let (left, right) = seed.split();
            let left = self.generate(size, left)?;
            let right = other.generate(size, right)?;
            Some(left.zip(right))
        })
    }

    /// Generate three values independently.
    pub fn zip3<U, V>(self, second: Gen<U>, third: Gen<V>) -> Gen<(T, U, V)>
    where
        T: Clone,
        U: Clone + 'static,
        V: Clone + 'static,
    {
        self.zip(second.zip(third))
            .map(|(a, (b, c))| (a, b, c))
    }

    /// Choose uniformly between generators.
    pub fn one_of(generators: Vec<Gen<T>>) -> Self {
        Gen::frequency(generators.into_iter().map(|gen| (1, gen)).collect())
    }

    /// Choose between generators with the given relative weights.
    ///
    /// Entries with weight zero are never chosen. With no positive weight
    /// at all the generator is always exhausted.
    pub fn frequency(choices: Vec<(u32, Gen<T>)>) -> Self {
        let total: u64 = choices.iter().map(|(weight, _)| *weight as u64).sum();
        Gen::partial(move |size, seed| {
            if total == 0 {
                return None;
            }
            let (pick_seed, gen_seed) = seed.split();
            let (mut pick, _) = pick_seed.next_bounded(total);
            for (weight, gen) in &choices {
                let weight = *weight as u64;
                if pick < weight {
                    return gen.generate(size, gen_seed);
                }
                pick -= weight;
            }
            None
        })
    }

    /// Pick one of the given items, shrinking towards the first.
    pub fn element_of(items: Vec<T>) -> Self
    where
        T: Clone + Send + Sync,
    {
        assert!(!items.is_empty(), "element_of requires at least one item");
        let last = items.len() - 1;
        Gen::<usize>::int_range(0, last).map(move |index| items[index].clone())
    }
}

impl<T: Clone + 'static> Gen<Option<T>> {
    /// Generate `None` a quarter of the time, otherwise `Some`.
    /// `Some` values shrink to `None` first.
    pub fn option_of(gen: Gen<T>) -> Self {
        Gen::partial(move |size, seed| {
            let (pick, rest) = seed.split();
            if pick.next_bounded(4).0 == 0 {
                return Some(Tree::singleton(None));
            }
            let inner = gen.generate(size, rest)?.map(Some);
            let value = inner.value.clone();
            Some(Tree::lazy(value, move || {
                let mut children = vec![Tree::singleton(None)];
                children.extend(inner.children());
                children
            }))
        })
    }
}

impl<T: Clone + 'static> Gen<Vec<T>> {
    /// Generate a vector with length in `[min_len, max_len]`, scaled by size.
    pub fn vec_of(element: Gen<T>, min_len: usize, max_len: usize) -> Self {
        assert!(min_len <= max_len, "vec_of: min_len exceeds max_len");
        Gen::partial(move |size, seed| {
            let upper = size.scale_len(min_len, max_len);
            let (len_seed, mut seed) = seed.split();
            let (extra, _) = len_seed.next_bounded((upper - min_len + 1) as u64);
            let len = min_len + extra as usize;

            let mut trees = Vec::with_capacity(len);
            for _ in 0..len {
                let (element_seed, next) = seed.split();
                seed = next;
                trees.push(element.generate(size, element_seed)?);
            }
            Some(vec_tree(trees, min_len))
        })
    }
}

impl<T: Clone + Ord + 'static> Gen<BTreeSet<T>> {
    /// Generate a set of distinct elements with size in `[min_len, max_len]`.
    ///
    /// Duplicates are redrawn a bounded number of times; if the element
    /// generator cannot supply `min_len` distinct values the generator
    /// comes up empty.
    pub fn set_of(element: Gen<T>, min_len: usize, max_len: usize) -> Self {
        assert!(min_len <= max_len, "set_of: min_len exceeds max_len");
        Gen::partial(move |size, seed| {
            let upper = size.scale_len(min_len, max_len);
            let (len_seed, mut seed) = seed.split();
            let (extra, _) = len_seed.next_bounded((upper - min_len + 1) as u64);
            let target = min_len + extra as usize;

            let mut seen = BTreeSet::new();
            let mut trees = Vec::with_capacity(target);
            let mut attempts = 0;
            while trees.len() < target && attempts < target * FILTER_RETRY_LIMIT {
                attempts += 1;
                let (element_seed, next) = seed.split();
                seed = next;
                if let Some(tree) = element.generate(size, element_seed) {
                    if seen.insert(tree.value.clone()) {
                        trees.push(tree);
                    }
                }
            }
            if trees.len() < min_len {
                return None;
            }

            vec_tree(trees, min_len)
                .filter(|items| all_distinct(items))
                .map(|tree| tree.map(|items| items.into_iter().collect()))
        })
    }
}

fn all_distinct<T: Ord>(items: &[T]) -> bool {
    items.iter().collect::<BTreeSet<_>>().len() == items.len()
}

/// Primitive generators.
impl Gen<bool> {
    /// Generate a random boolean, shrinking to `false`.
    pub fn bool() -> Self {
        Gen::new(|_size, seed| {
            let (value, _new_seed) = seed.next_bool();
            Tree::unfold(value, |&b| if b { vec![false] } else { vec![] })
        })
    }
}

/// Shrink candidates for `value`, moving towards `origin`: the origin
/// itself first, then values progressively closer to `value`.
fn towards(origin: i128, value: i128) -> Vec<i128> {
    if value == origin {
        return Vec::new();
    }
    let mut candidates = vec![origin];
    let mut diff = (value - origin) / 2;
    while diff != 0 {
        candidates.push(value - diff);
        diff /= 2;
    }
    candidates
}

macro_rules! integral_gen {
    ($($t:ty),*) => {
        $(
            impl Gen<$t> {
                /// Generate an integer in `[min, max]`, shrinking towards the
                /// in-range value closest to zero.
                pub fn int_range(min: $t, max: $t) -> Self {
                    assert!(min <= max, "int_range: min ({}) exceeds max ({})", min, max);
                    let (lo, hi) = (min as i128, max as i128);
                    let origin = if lo > 0 {
                        lo
                    } else if hi < 0 {
                        hi
                    } else {
                        0
                    };
                    Gen::new(move |_size, seed| {
                        let span = hi - lo + 1;
                        let offset = if span > u64::MAX as i128 {
                            seed.next_u64().0 as i128
                        } else {
                            seed.next_bounded(span as u64).0 as i128
                        };
                        Tree::unfold(lo + offset, move |&x| towards(origin, x))
                            .map(|x| x as $t)
                    })
                }
            }
        )*
    };
}

integral_gen!(i32, i64, u32, u64, usize);

impl Gen<i32> {
    /// Generate a positive integer.
    pub fn positive() -> Self {
        Self::int_range(1, i32::MAX)
    }

    /// Generate a natural number (including zero).
    pub fn natural() -> Self {
        Self::int_range(0, i32::MAX)
    }
}

impl Gen<char> {
    /// Lowercase hexadecimal digit, shrinking towards `'0'`.
    pub fn hex_digit() -> Self {
        Gen::element_of("0123456789abcdef".chars().collect())
    }

    /// Lowercase ASCII letter, shrinking towards `'a'`.
    pub fn alpha_lower() -> Self {
        Gen::element_of(('a'..='z').collect())
    }

    /// ASCII letter or digit, shrinking towards `'a'`.
    pub fn ascii_alphanumeric() -> Self {
        Gen::element_of(('a'..='z').chain('A'..='Z').chain('0'..='9').collect())
    }
}

impl Gen<String> {
    /// Strings built from `chars`, with length in `[min_len, max_len]`.
    pub fn string_of(chars: Gen<char>, min_len: usize, max_len: usize) -> Self {
        Gen::<Vec<char>>::vec_of(chars, min_len, max_len).map(|chars| chars.into_iter().collect())
    }

    /// Hexadecimal strings such as track identifiers.
    pub fn hex_string(min_len: usize, max_len: usize) -> Self {
        Self::string_of(Gen::<char>::hex_digit(), min_len, max_len)
    }

    /// Lowercase alphabetic strings.
    pub fn alpha_string(min_len: usize, max_len: usize) -> Self {
        Self::string_of(Gen::<char>::alpha_lower(), min_len, max_len)
    }
}

/// Types with a default generator.
///
/// `#[derive(Generate)]` uses this to pick a generator for each field that
/// has no explicit `#[generator(...)]` attribute.
pub trait Arbitrary: Sized + 'static {
    /// The default generator for this type.
    fn arbitrary() -> Gen<Self>;
}

impl Arbitrary for bool {
    fn arbitrary() -> Gen<Self> {
        Gen::<bool>::bool()
    }
}

macro_rules! arbitrary_int {
    ($($t:ty => ($min:expr, $max:expr)),*) => {
        $(
            impl Arbitrary for $t {
                fn arbitrary() -> Gen<Self> {
                    Gen::<$t>::int_range($min, $max)
                }
            }
        )*
    };
}

arbitrary_int!(
    i32 => (-1000, 1000),
    i64 => (-1000, 1000),
    u32 => (0, 1000),
    u64 => (0, 1000),
    usize => (0, 1000)
);

impl Arbitrary for char {
    fn arbitrary() -> Gen<Self> {
        Gen::<char>::alpha_lower()
    }
}

impl Arbitrary for String {
    fn arbitrary() -> Gen<Self> {
        Gen::<String>::alpha_string(0, 16)
    }
}

impl<T: Arbitrary + Clone> Arbitrary for Vec<T> {
    fn arbitrary() -> Gen<Self> {
        Gen::<Vec<T>>::vec_of(T::arbitrary(), 0, 32)
    }
}

impl<T: Arbitrary + Clone> Arbitrary for Option<T> {
    fn arbitrary() -> Gen<Self> {
        Gen::<Option<T>>::option_of(T::arbitrary())
    }
}
