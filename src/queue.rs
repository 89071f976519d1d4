//! An insertion ordered set of inventory vectors with a cursor that survives removal.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
    iter::FusedIterator,
};

use slab::Slab;
use tracing::{error, trace};

use crate::integrity::Violations;

/// Stable handle of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeKey(usize);

#[derive(Debug)]
struct Node<T> {
    id: T,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
}

/// Iteration state driven by [`InvQueue::front`] and [`InvQueue::next`].
#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    /// Node last returned to the caller.
    current: Option<NodeKey>,
    /// Successor of a removed `current`, returned by the next advance.
    pending: Option<NodeKey>,
}

/// Queue of announced objects that have not been fetched yet.
///
/// Identifiers are kept in insertion order and each identifier is held at most once.
/// Membership tests are answered from a hash index, the order lives in a doubly linked
/// list whose nodes are stored in a [`Slab`].
///
/// The queue can be walked with an external cursor:
///
/// ```
/// # use invqueue::InvQueue;
/// let mut queue = InvQueue::new();
/// queue.push_back_all([1u32, 2, 3, 4]);
///
/// let mut item = queue.front();
/// while let Some(id) = item {
///     if id % 2 == 0 {
///         // removing the visited element does not disturb the walk
///         queue.remove(&id);
///     }
///     item = queue.next();
/// }
/// assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
/// ```
///
/// The queue does no synchronization of its own, wrap it in a lock if it is shared.
pub struct InvQueue<T> {
    nodes: Slab<Node<T>>,
    index: HashMap<T, NodeKey>,
    head: Option<NodeKey>,
    tail: Option<NodeKey>,
    cursor: Cursor,
}

impl<T> Default for InvQueue<T> {
    fn default() -> Self {
        Self {
            nodes: Slab::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            cursor: Cursor::default(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for InvQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> InvQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue with room for `capacity` identifiers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Number of identifiers in the queue.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the queue holds no identifiers.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterates the identifiers front to back.
    ///
    /// This borrows the queue and leaves the cursor of [`front`](Self::front) and
    /// [`next`](Self::next) untouched.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            next: self.head,
            remaining: self.nodes.len(),
        }
    }

    fn node(&self, key: NodeKey) -> Option<&Node<T>> {
        self.nodes.get(key.0)
    }

    fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node<T>> {
        self.nodes.get_mut(key.0)
    }

    fn link_back(&mut self, id: T) -> NodeKey {
        let key = NodeKey(self.nodes.insert(Node {
            id,
            prev: self.tail,
            next: None,
        }));
        match self.tail.and_then(|tail| self.nodes.get_mut(tail.0)) {
            Some(tail) => tail.next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    fn link_front(&mut self, id: T) -> NodeKey {
        let key = NodeKey(self.nodes.insert(Node {
            id,
            prev: None,
            next: self.head,
        }));
        match self.head.and_then(|head| self.nodes.get_mut(head.0)) {
            Some(head) => head.prev = Some(key),
            None => self.tail = Some(key),
        }
        self.head = Some(key);
        key
    }

    /// Detaches a node from the sequence and keeps the cursor pointing at a live node.
    ///
    /// The index is not touched.
    fn unlink(&mut self, key: NodeKey) -> Option<Node<T>> {
        let node = self.nodes.try_remove(key.0)?;
        match node.prev.and_then(|prev| self.nodes.get_mut(prev.0)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|next| self.nodes.get_mut(next.0)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        if self.cursor.current == Some(key) {
            self.cursor.current = None;
            self.cursor.pending = node.next;
        } else if self.cursor.pending == Some(key) {
            self.cursor.pending = node.next;
        }
        Some(node)
    }
}

impl<T> InvQueue<T>
where
    T: Hash + Eq + Clone + fmt::Debug,
{
    /// Adds `id` to the back of the queue.
    ///
    /// Returns `false` and leaves the queue unchanged if `id` is already present.
    pub fn push_back(&mut self, id: T) -> bool {
        if self.index.contains_key(&id) {
            trace!(?id, "duplicate inventory vector");
            return false;
        }
        let key = self.link_back(id.clone());
        self.index.insert(id, key);
        true
    }

    /// Adds `id` to the front of the queue.
    ///
    /// Returns `false` and leaves the queue unchanged if `id` is already present.
    pub fn push_front(&mut self, id: T) -> bool {
        if self.index.contains_key(&id) {
            trace!(?id, "duplicate inventory vector");
            return false;
        }
        let key = self.link_front(id.clone());
        self.index.insert(id, key);
        true
    }

    /// Adds all `ids` to the back of the queue, in order.
    ///
    /// Returns `true` only if none of them was a duplicate. This is not atomic: every
    /// identifier that is not a duplicate gets inserted even if the result is `false`.
    pub fn push_back_all(&mut self, ids: impl IntoIterator<Item = T>) -> bool {
        ids.into_iter()
            .fold(true, |all_new, id| self.push_back(id) & all_new)
    }

    /// Returns `true` if `id` is in the queue.
    pub fn contains(&self, id: &T) -> bool {
        self.index.contains_key(id)
    }

    /// Restarts iteration and returns the identifier at the front of the queue.
    pub fn front(&mut self) -> Option<T> {
        self.cursor = Cursor {
            current: self.head,
            pending: None,
        };
        let head = self.head?;
        self.node(head).map(|node| node.id.clone())
    }

    /// Advances the cursor and returns the identifier it now points at.
    ///
    /// Returns `None` at the end of the queue, or if iteration was not started with
    /// [`front`](Self::front). If the element returned last was removed in the meantime,
    /// iteration resumes at the element that followed it.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<T> {
        if let Some(pending) = self.cursor.pending.take() {
            self.cursor.current = Some(pending);
            return self.node(pending).map(|node| node.id.clone());
        }
        let current = self.cursor.current?;
        self.cursor.current = self.node(current).and_then(|node| node.next);
        let current = self.cursor.current?;
        self.node(current).map(|node| node.id.clone())
    }

    /// Removes `id` from the queue.
    ///
    /// Returns `false` if `id` is not present. Removing the element last returned by
    /// [`front`](Self::front) or [`next`](Self::next) is allowed, the following call to
    /// `next` continues with its successor.
    pub fn remove(&mut self, id: &T) -> bool {
        let Some(key) = self.index.remove(id) else {
            return false;
        };
        let key = match self.node(key) {
            Some(node) if node.id == *id => Some(key),
            _ => self.find(id),
        };
        let Some(key) = key else {
            error!(?id, "inventory vector is indexed but not queued");
            return true;
        };
        if self.cursor.current == Some(key) {
            trace!(?id, "removing inventory vector under cursor");
        }
        self.unlink(key);
        true
    }

    /// Removes and returns the identifier at the front of the queue.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        let node = self.unlink(head)?;
        self.index.remove(&node.id);
        Some(node.id)
    }

    /// Finds the node holding `id` by walking the sequence from the front.
    fn find(&self, id: &T) -> Option<NodeKey> {
        let mut cur = self.head;
        while let Some(key) = cur {
            let node = self.node(key)?;
            if node.id == *id {
                return Some(key);
            }
            cur = node.next;
        }
        None
    }

    /// Checks that the index and the sequence describe the same identifiers.
    ///
    /// Walks the whole sequence, so this is meant for tests and diagnostics.
    pub fn check_integrity(&self) -> Violations {
        let mut result = Violations::NONE;
        let mut seen = HashSet::with_capacity(self.index.len());
        let mut prev = None;
        let mut cur = self.head;
        let mut len = 0;
        while let Some(key) = cur {
            // more steps than nodes means the links form a cycle
            if len >= self.nodes.len() {
                result |= Violations::LINKS;
                break;
            }
            let Some(node) = self.node(key) else {
                result |= Violations::LINKS;
                break;
            };
            if node.prev != prev {
                result |= Violations::LINKS;
            }
            if !seen.insert(&node.id) {
                result |= Violations::DUPLICATE;
            }
            if !self.index.contains_key(&node.id) {
                result |= Violations::UNINDEXED;
            }
            len += 1;
            prev = Some(key);
            cur = node.next;
        }
        if self.tail != prev || len != self.nodes.len() {
            result |= Violations::LINKS;
        }
        if self.index.len() != len {
            result |= Violations::LENGTH;
        }
        for (id, handle) in &self.index {
            if !seen.contains(id) {
                result |= Violations::MISSING;
            } else if self.node(*handle).is_none_or(|node| node.id != *id) {
                result |= Violations::STALE_HANDLE;
            }
        }
        result
    }

    /// Detaches the node holding `id` from the sequence but keeps its index entry.
    ///
    /// Puts the queue into the state `remove` must tolerate but never produces.
    #[cfg(test)]
    pub(crate) fn unlink_keep_index(&mut self, id: &T) -> bool {
        match self.find(id) {
            Some(key) => self.unlink(key).is_some(),
            None => false,
        }
    }
}

/// Iterator over the identifiers of an [`InvQueue`], front to back.
///
/// Created by [`InvQueue::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    nodes: &'a Slab<Node<T>>,
    next: Option<NodeKey>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.nodes.get(self.next?.0)?;
        self.next = node.next;
        self.remaining -= 1;
        Some(&node.id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a InvQueue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
