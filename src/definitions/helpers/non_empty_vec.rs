use serde::{Deserialize, Serialize};
use std::ops::Deref;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected a non-empty array")]
    Empty,
}

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(t: T) -> Self {
        Self(vec![t])
    }

    pub fn maybe_new(v: Vec<T>) -> Option<Self> {
        Self::try_from(v).ok()
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }

    /// Never fails, there is always at least one element.
    pub fn head(&self) -> &T {
        &self.0[0]
    }

    /// The first element matching `predicate`, or the head when none does.
    pub fn find_or_head(&self, predicate: impl Fn(&T) -> bool) -> &T {
        self.0
            .iter()
            .find(|item| predicate(item))
            .unwrap_or_else(|| self.head())
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = Error;

    fn try_from(v: Vec<T>) -> Result<NonEmptyVec<T>, Error> {
        if v.is_empty() {
            return Err(Error::Empty);
        }
        Ok(NonEmptyVec(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Vec<T> {
        v
    }
}

impl<T: Clone> AsRef<[T]> for NonEmptyVec<T> {
    fn as_ref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(NonEmptyVec::<u8>::maybe_new(vec![]).is_none());
        assert!(serde_json::from_str::<NonEmptyVec<u8>>("[]").is_err());
    }

    #[test]
    fn falls_back_to_head() {
        let v = NonEmptyVec::try_from(vec![1, 2, 3]).unwrap();
        assert_eq!(*v.find_or_head(|x| *x == 2), 2);
        assert_eq!(*v.find_or_head(|x| *x == 9), 1);
    }
}
