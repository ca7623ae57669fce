//! Type-level cons-list used by [`AppBuilder`](crate::builder::AppBuilder) to
//! track, purely at compile time, which bean types have been provided (`P`)
//! and which are still required (`R`).
//!
//! None of these types carry any runtime data — they only exist as type
//! parameters and phantom markers so the compiler can reject
//! `build_state()`/`try_build_state()` calls that are missing a dependency,
//! with the error pointing at the missing bean type rather than a generic
//! trait-bound failure.

use std::marker::PhantomData;

/// The empty type-level list.
pub struct TNil;

/// A non-empty type-level list: `Head` followed by the rest of the list, `Tail`.
pub struct TCons<Head, Tail>(PhantomData<(Head, Tail)>);

/// Index witness: `T` is the head of the list it indexes into.
pub struct Here;

/// Index witness: `T` is found in the tail, at the index witnessed by `I`.
pub struct There<I>(PhantomData<I>);

/// `Self` (a type-level list) contains `T`, located via witness `I`.
///
/// Implemented automatically for every position in a `TCons` chain; never
/// implemented by hand.
pub trait Contains<T, I> {}

impl<T, Tail> Contains<T, Here> for TCons<T, Tail> {}

impl<T, Head, Tail, I> Contains<T, There<I>> for TCons<Head, Tail> where Tail: Contains<T, I> {}

/// Append `Other` onto the end of `Self`, producing `Self::Output`.
///
/// Used to thread a bean's dependency list (or a plugin's requirement list)
/// into the builder's running `R` (required) type parameter.
pub trait TAppend<Other> {
    type Output;
}

impl<Other> TAppend<Other> for TNil {
    type Output = Other;
}

impl<Head, Tail, Other> TAppend<Other> for TCons<Head, Tail>
where
    Tail: TAppend<Other>,
{
    type Output = TCons<Head, <Tail as TAppend<Other>>::Output>;
}

/// Every element of `Self` (a requirement list) is present in `P`
/// (the provision list), located via the index-witness list `I`.
///
/// `AppBuilder::build_state`/`try_build_state` bound `R: AllSatisfied<P, _>`
/// so that resolving the bean graph is a compile error, not a panic, when a
/// bean depends on a type nothing provides.
pub trait AllSatisfied<P, I> {}

impl<P> AllSatisfied<P, TNil> for TNil {}

impl<Head, Tail, P, HeadIdx, TailIdx> AllSatisfied<P, TCons<HeadIdx, TailIdx>> for TCons<Head, Tail>
where
    P: Contains<Head, HeadIdx>,
    Tail: AllSatisfied<P, TailIdx>,
{
}

/// `Self` (an application state struct, usually `#[derive(BeanState)]`) can be
/// built from every type in the provision list `P`, located via witness `I`.
///
/// Generated by `#[derive(BeanState)]` — one `Contains<FieldType, _>` bound
/// per distinct field type, bundled into a tuple `I`.
pub trait BuildableFrom<P, I> {}
