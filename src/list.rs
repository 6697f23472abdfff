use std::fmt;
use std::iter::FromIterator;
use std::rc::Rc;

struct Pair<T> {
    head: T,
    tail: List<T>,
}

/// An immutable singly-linked list of pair cells.
///
/// Tails are shared, so `clone` and `cons` are O(1) and never copy elements.
pub struct List<T> {
    cell: Option<Rc<Pair<T>>>,
}

impl<T> List<T> {
    /// The empty list.
    pub const fn new() -> Self {
        List { cell: None }
    }

    pub fn cons(head: T, tail: List<T>) -> Self {
        List {
            cell: Some(Rc::new(Pair { head, tail })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cell.is_none()
    }

    pub fn first(&self) -> Option<&T> {
        self.cell.as_deref().map(|pair| &pair.head)
    }

    pub fn rest(&self) -> Option<List<T>> {
        self.cell.as_deref().map(|pair| pair.tail.clone())
    }

    pub fn split_first(&self) -> Option<(&T, &List<T>)> {
        self.cell.as_deref().map(|pair| (&pair.head, &pair.tail))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.cell.as_deref(),
        }
    }

    /// Applies `f` to every element, keeping order.
    pub fn map<U, F>(&self, f: F) -> List<U>
    where
        F: FnMut(&T) -> U,
    {
        self.iter().map(f).collect()
    }

    /// Keeps the elements for which `pred` holds, in their original order.
    pub fn filter<P>(&self, mut pred: P) -> List<T>
    where
        T: Clone,
        P: FnMut(&T) -> bool,
    {
        self.iter().filter(|x| pred(*x)).cloned().collect()
    }

    /// Left fold: `f(...f(f(seed, x0), x1)..., xn)`. The empty list yields `seed`.
    pub fn reduce<A, F>(&self, seed: A, f: F) -> A
    where
        F: FnMut(A, &T) -> A,
    {
        self.iter().fold(seed, f)
    }

    /// Copies the cells of `self` in front of `other`; `other` is shared, not copied.
    pub fn append(&self, other: &List<T>) -> List<T>
    where
        T: Clone,
    {
        let front: Vec<T> = self.iter().cloned().collect();
        front
            .into_iter()
            .rev()
            .fold(other.clone(), |tail, head| List::cons(head, tail))
    }

    pub fn reverse(&self) -> List<T>
    where
        T: Clone,
    {
        self.reduce(List::new(), |acc, x| List::cons(x.clone(), acc))
    }

    /// Detaches the first cell when this list is its only owner and returns
    /// its head, leaving `self` as the tail. A shared cell is released without
    /// being unlinked and `self` becomes empty.
    pub fn pop_unique(&mut self) -> Option<T> {
        let rc = self.cell.take()?;
        match Rc::try_unwrap(rc) {
            Ok(mut pair) => {
                self.cell = pair.tail.cell.take();
                Some(pair.head)
            }
            Err(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &List<T>) -> bool {
        match (&self.cell, &other.cell) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for List<T> {
    fn clone(&self) -> Self {
        List {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        List::new()
    }
}

// Unlinks uniquely owned cells one at a time so long lists don't overflow the stack.
impl<T> Drop for List<T> {
    fn drop(&mut self) {
        let mut cell = self.cell.take();
        while let Some(rc) = cell {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => cell = pair.tail.cell.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T: PartialEq> PartialEq for List<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.iter().eq(other.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<T> = iter.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(List::new(), |tail, head| List::cons(head, tail))
    }
}

pub struct Iter<'a, T> {
    next: Option<&'a Pair<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|pair| {
            self.next = pair.tail.cell.as_deref();
            &pair.head
        })
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
