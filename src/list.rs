//! Intrusive doubly linked list used by store segments to order entries for eviction.
//!
//! The list owns its nodes; callers keep raw pointers to them (typically in a hash map) so that
//! moving or unlinking a node is O(1). Head and tail are sentinel nodes that never carry a value.

use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};

/// A node in the doubly linked list.
///
/// Contains a value and pointers to the previous and next entries.
pub struct Entry<T> {
    /// The value stored in this entry. Uninitialized only for the sentinels.
    val: mem::MaybeUninit<T>,
    prev: *mut Entry<T>,
    next: *mut Entry<T>,
}

impl<T> Entry<T> {
    fn new(val: T) -> Self {
        Entry {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    fn new_sigil() -> Self {
        Entry {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Returns a reference to the value stored in this entry.
    ///
    /// # Safety
    ///
    /// Must not be called on a sentinel node.
    pub unsafe fn get_value(&self) -> &T {
        // SAFETY: caller guarantees this is not a sentinel, so the value is initialized
        unsafe { self.val.assume_init_ref() }
    }

    /// Consumes an entry detached from its list and returns the value.
    ///
    /// # Safety
    ///
    /// Must not be called on a sentinel node.
    pub unsafe fn into_value(self: Box<Self>) -> T {
        // SAFETY: caller guarantees this is not a sentinel, so the value is initialized
        unsafe { self.val.assume_init() }
    }
}

/// An unbounded doubly linked list with O(1) insertion at the front, removal and
/// move-to-front.
///
/// The front holds the most recently added (or promoted) entry; the back holds the oldest.
pub struct List<T> {
    len: usize,
    head: *mut Entry<T>,
    tail: *mut Entry<T>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    /// Creates an empty list.
    pub fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Entry::new_sigil()));
        let tail = Box::into_raw(Box::new(Entry::new_sigil()));

        // SAFETY: head and tail are newly allocated and valid pointers
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }

        List { len: 0, head, tail }
    }

    /// Returns the current number of entries in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a value to the front of the list and returns a pointer to its node.
    ///
    /// The pointer stays valid until the node is removed or the list is dropped.
    pub fn add(&mut self, v: T) -> *mut Entry<T> {
        let node = NonNull::from(Box::leak(Box::new(Entry::new(v)))).as_ptr();
        // SAFETY: node is a newly allocated entry that is not part of any list yet
        unsafe { self.attach(node) };
        self.len += 1;
        node
    }

    /// Removes `node` from the list and returns ownership of it.
    ///
    /// # Safety
    ///
    /// `node` must be a pointer returned by [`add`](Self::add) on this list that has not
    /// been removed yet.
    pub unsafe fn remove(&mut self, node: *mut Entry<T>) -> Option<Box<Entry<T>>> {
        if self.is_empty() || node.is_null() || node == self.head || node == self.tail {
            return None;
        }
        // SAFETY: caller guarantees node is a live member of this list
        unsafe {
            self.detach(node);
            self.len -= 1;
            Some(Box::from_raw(node))
        }
    }

    /// Removes the oldest entry.
    pub fn remove_last(&mut self) -> Option<Box<Entry<T>>> {
        // SAFETY: tail is a valid sentinel; its prev is either head or a live member
        let prev = unsafe { (*self.tail).prev };
        // SAFETY: prev is a live member or the head sentinel, which `remove` rejects
        unsafe { self.remove(prev) }
    }

    /// Moves `node` to the front of the list.
    ///
    /// # Safety
    ///
    /// `node` must be a live member of this list.
    pub unsafe fn move_to_front(&mut self, node: *mut Entry<T>) {
        if node.is_null() || node == self.head || node == self.tail {
            return;
        }
        // SAFETY: head is valid; caller guarantees node is a live member
        unsafe {
            if (*self.head).next == node {
                return;
            }
            self.detach(node);
            self.attach(node);
        }
    }

    /// Walks from the back (oldest) towards the front and returns the first node whose value
    /// satisfies `pred`.
    pub fn find_from_back<P>(&self, mut pred: P) -> Option<*mut Entry<T>>
    where
        P: FnMut(&T) -> bool,
    {
        // SAFETY: every pointer between the sentinels is a live member with an initialized value
        unsafe {
            let mut node = (*self.tail).prev;
            while node != self.head {
                if pred((*node).get_value()) {
                    return Some(node);
                }
                node = (*node).prev;
            }
        }
        None
    }

    /// Removes and drops every entry.
    pub fn clear(&mut self) {
        while let Some(entry) = self.remove_last() {
            // SAFETY: entries returned by remove_last are never sentinels
            drop(unsafe { entry.into_value() });
        }
    }

    /// # Safety
    ///
    /// `node` must be a live member of this list.
    unsafe fn detach(&mut self, node: *mut Entry<T>) {
        // SAFETY: a live member's neighbours are valid entries or sentinels
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// # Safety
    ///
    /// `node` must be valid and not currently linked into this list.
    unsafe fn attach(&mut self, node: *mut Entry<T>) {
        // SAFETY: head is valid for the lifetime of the list; caller guarantees node is valid
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*self.head).next = node;
            (*(*node).next).prev = node;
        }
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: head and tail were allocated in `new` and are freed only here
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("length", &self.len).finish()
    }
}
