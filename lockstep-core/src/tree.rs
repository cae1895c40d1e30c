//! Rose tree implementation for shrinking generated values.

use std::fmt;
use std::rc::Rc;

type Shrinks<T> = Rc<dyn Fn() -> Vec<Tree<T>>>;

/// A rose tree containing a value and its shrink possibilities.
///
/// Children are expanded on demand, so a tree can describe an arbitrarily
/// deep shrink space without building it up front. Children are ordered
/// simplest first: the shrinker accepts the first child that still fails.
pub struct Tree<T> {
    pub value: T,
    shrinks: Shrinks<T>,
}

impl<T: Clone> Clone for Tree<T> {
    fn clone(&self) -> Self {
        Tree {
            value: self.value.clone(),
            shrinks: Rc::clone(&self.shrinks),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Tree<T> {
    /// Create a new tree with the given value and no children.
    pub fn singleton(value: T) -> Self {
        Tree {
            value,
            shrinks: Rc::new(Vec::<Tree<T>>::new),
        }
    }

    /// Create a new tree with the given value and a fixed set of children.
    pub fn with_children(value: T, children: Vec<Tree<T>>) -> Self
    where
        T: Clone,
    {
        Tree {
            value,
            shrinks: Rc::new(move || children.clone()),
        }
    }

    /// Create a tree whose children are computed when first asked for.
    pub fn lazy<F>(value: T, children: F) -> Self
    where
        F: Fn() -> Vec<Tree<T>> + 'static,
    {
        Tree {
            value,
            shrinks: Rc::new(children),
        }
    }

    /// Build a tree by repeatedly applying a shrink function.
    ///
    /// `shrink` must return strictly simpler values, otherwise walking the
    /// tree never ends.
    pub fn unfold<F>(value: T, shrink: F) -> Self
    where
        T: Clone,
        F: Fn(&T) -> Vec<T> + 'static,
    {
        Self::unfold_rc(value, Rc::new(shrink))
    }

    fn unfold_rc(value: T, shrink: Rc<dyn Fn(&T) -> Vec<T>>) -> Self
    where
        T: Clone,
    {
        let origin = value.clone();
        Tree {
            value,
            shrinks: Rc::new(move || {
                shrink(&origin)
                    .into_iter()
                    .map(|candidate| Tree::unfold_rc(candidate, Rc::clone(&shrink)))
                    .collect()
            }),
        }
    }

    /// Expand the immediate shrink candidates.
    pub fn children(&self) -> Vec<Tree<T>> {
        (self.shrinks)()
    }

    /// Check if the tree has any children (shrinks).
    pub fn has_shrinks(&self) -> bool {
        !self.children().is_empty()
    }

    /// Get the value from the tree.
    pub fn outcome(&self) -> &T {
        &self.value
    }

    /// Map a function over the tree values.
    pub fn map<U, F>(self, f: F) -> Tree<U>
    where
        U: 'static,
        F: Fn(T) -> U + 'static,
    {
        self.map_rc(Rc::new(f))
    }

    fn map_rc<U: 'static>(self, f: Rc<dyn Fn(T) -> U>) -> Tree<U> {
        let shrinks = self.shrinks;
        let value = f(self.value);
        Tree {
            value,
            shrinks: Rc::new(move || {
                shrinks()
                    .into_iter()
                    .map(|child| child.map_rc(Rc::clone(&f)))
                    .collect()
            }),
        }
    }

    /// Feed the value into a dependent tree.
    ///
    /// Shrinks of the outer value come first, followed by the shrinks of
    /// the dependent value. Outer shrinks for which `f` yields nothing are
    /// dropped.
    pub fn bind<U, F>(self, f: F) -> Option<Tree<U>>
    where
        U: 'static,
        F: Fn(T) -> Option<Tree<U>> + 'static,
    {
        self.bind_rc(Rc::new(f))
    }

    fn bind_rc<U: 'static>(self, f: Rc<dyn Fn(T) -> Option<Tree<U>>>) -> Option<Tree<U>> {
        let outer = self.shrinks;
        let inner = f(self.value)?;
        let inner_shrinks = inner.shrinks;
        Some(Tree {
            value: inner.value,
            shrinks: Rc::new(move || {
                let mut children: Vec<Tree<U>> = outer()
                    .into_iter()
                    .filter_map(|child| child.bind_rc(Rc::clone(&f)))
                    .collect();
                children.extend(inner_shrinks());
                children
            }),
        })
    }

    /// Filter the tree, keeping only values that satisfy the predicate.
    pub fn filter<F>(self, predicate: F) -> Option<Tree<T>>
    where
        F: Fn(&T) -> bool + 'static,
    {
        self.filter_rc(Rc::new(predicate))
    }

    fn filter_rc(self, predicate: Rc<dyn Fn(&T) -> bool>) -> Option<Tree<T>> {
        if !predicate(&self.value) {
            return None;
        }

        let shrinks = self.shrinks;
        Some(Tree {
            value: self.value,
            shrinks: Rc::new(move || {
                shrinks()
                    .into_iter()
                    .filter_map(|child| child.filter_rc(Rc::clone(&predicate)))
                    .collect()
            }),
        })
    }

    /// Pair two trees, shrinking the left component first.
    pub fn zip<U>(self, other: Tree<U>) -> Tree<(T, U)>
    where
        T: Clone,
        U: Clone + 'static,
    {
        let value = (self.value.clone(), other.value.clone());
        Tree::lazy(value, move || {
            let mut children: Vec<Tree<(T, U)>> = self
                .children()
                .into_iter()
                .map(|left| left.zip(other.clone()))
                .collect();
            children.extend(
                other
                    .children()
                    .into_iter()
                    .map(|right| self.clone().zip(right)),
            );
            children
        })
    }

    /// Collect values along the path of first children, up to `max_depth`.
    ///
    /// Mostly useful for inspecting a shrink tree in tests.
    pub fn first_path(&self, max_depth: usize) -> Vec<T>
    where
        T: Clone,
    {
        let mut path = vec![self.value.clone()];
        let mut current = self.clone();
        for _ in 0..max_depth {
            match current.children().into_iter().next() {
                Some(next) => {
                    path.push(next.value.clone());
                    current = next;
                }
                None => break,
            }
        }
        path
    }
}

impl<T: 'static> From<T> for Tree<T> {
    fn from(value: T) -> Self {
        Tree::singleton(value)
    }
}

/// Combine element trees into a tree of vectors.
///
/// Shrinks first drop contiguous chunks (largest first, never going below
/// `min_len`), then shrink individual elements in place.
pub fn vec_tree<T: Clone + 'static>(trees: Vec<Tree<T>>, min_len: usize) -> Tree<Vec<T>> {
    let value = trees.iter().map(|tree| tree.value.clone()).collect();
    Tree::lazy(value, move || {
        let mut children = Vec::new();
        let len = trees.len();

        let mut chunk = len.saturating_sub(min_len);
        while chunk > 0 {
            let mut start = 0;
            while start + chunk <= len {
                let mut kept = trees[..start].to_vec();
                kept.extend_from_slice(&trees[start + chunk..]);
                children.push(vec_tree(kept, min_len));
                start += chunk;
            }
            chunk /= 2;
        }

        for (index, tree) in trees.iter().enumerate() {
            for shrunk in tree.children() {
                let mut replaced = trees.clone();
                replaced[index] = shrunk;
                children.push(vec_tree(replaced, min_len));
            }
        }

        children
    })
}
