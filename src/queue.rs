/*!
The pending-event queue: a singly linked list held in ascending time order,
with a free list of recycled nodes so the steady state never touches the
allocator. The whole structure is guarded by one mutex in the sequencer;
nothing here locks.

Every node is owned by exactly one place at a time, either the queue or the
free list, and transfers between them are moves of the owning `Box`.
!*/

use crate::clock::Ticks;
use crate::event::SeqEvent;

struct Node {
    event: SeqEvent,
    next: Link,
}

type Link = Option<Box<Node>>;

pub(crate) struct EventQueue {
    head: Link,
    free: Link,
    len: usize,
    pooled: usize,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self {
            head: None,
            free: None,
            len: 0,
            pooled: 0,
        }
    }

    /// Take a node from the free list, or allocate when the pool is dry.
    fn acquire(&mut self, event: SeqEvent) -> Box<Node> {
        match self.free.take() {
            Some(mut node) => {
                self.free = node.next.take();
                self.pooled -= 1;
                node.event = event;
                node
            }
            None => Box::new(Node { event, next: None }),
        }
    }

    fn release(&mut self, mut node: Box<Node>) {
        node.next = self.free.take();
        self.free = Some(node);
        self.pooled += 1;
    }

    /// Link `event` in ascending time order. Equal times keep insertion
    /// order, so the new node lands after every existing node with the same
    /// time.
    pub(crate) fn insert(&mut self, event: SeqEvent) {
        let node = self.acquire(event);
        insert_node(&mut self.head, node);
        self.len += 1;
    }

    /// Unlink and return the head event if its time is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Ticks) -> Option<SeqEvent> {
        match self.head.take() {
            Some(mut node) if node.event.time <= now => {
                self.head = node.next.take();
                self.len -= 1;
                let event = node.event;
                self.release(node);
                Some(event)
            }
            other => {
                self.head = other;
                None
            }
        }
    }

    /// Drop every pending event back into the pool.
    pub(crate) fn drain(&mut self) {
        while let Some(mut node) = self.head.take() {
            self.head = node.next.take();
            self.release(node);
        }
        self.len = 0;
    }

    pub(crate) fn head_time(&self) -> Option<Ticks> {
        self.head.as_ref().map(|node| node.event.time)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn pooled(&self) -> usize {
        self.pooled
    }
}

fn insert_node(link: &mut Link, mut node: Box<Node>) {
    match link {
        Some(head) if head.event.time <= node.event.time => insert_node(&mut head.next, node),
        _ => {
            node.next = link.take();
            *link = Some(node);
        }
    }
}

// the derived recursive drop would use one stack frame per node
impl Drop for EventQueue {
    fn drop(&mut self) {
        self.drain();
        while let Some(mut node) = self.free.take() {
            self.free = node.next.take();
        }
    }
}
