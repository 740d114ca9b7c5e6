//! Aliases for the mathematical objects used throughout the crate, mainly
//! maps, sets and bijections. Hiding the concrete types here keeps the rest
//! of the code independent of the backing implementation.

/// Type alias for maps that preserve insertion order. Deterministic
/// iteration matters in several places, for example when assigning DIMACS
/// ids or when extracting cliques.
pub type Map<K, V> = indexmap::IndexMap<K, V>;

/// Type alias for sets that preserve insertion order.
pub type Set<S> = indexmap::IndexSet<S>;

/// Represents a bijective mapping between `L` and `R`, that is a mapping
/// which associates each `L` with precisely one `R` and vice versa.
pub type Bijection<L, R> = bimap::BiBTreeMap<L, R>;
