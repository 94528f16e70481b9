//! Optimistic list shared by the CRUD pages.
//!
//! A mutation is applied locally first, then either reconciled with the row the
//! backend returned or rolled back when the call fails.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use log::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Document, Event, Notice, Poll, Profile};

pub trait Record: Clone {
    type Id: Eq + Hash + Clone + Debug;

    fn record_id(&self) -> Self::Id;
}

macro_rules! uuid_record {
    ($($ty:ty),*) => {
        $(
            impl Record for $ty {
                type Id = Uuid;

                fn record_id(&self) -> Uuid {
                    self.id
                }
            }
        )*
    };
}

uuid_record!(Notice, Event, Document, Poll, Profile);

#[derive(Debug, Clone)]
pub enum Mutation<T: Record> {
    Insert(T),
    Update(T),
    Remove(T::Id),
}

/// Undo information for one applied mutation.
#[derive(Debug)]
pub struct Pending<T: Record> {
    undo: Undo<T>,
}

#[derive(Debug)]
enum Undo<T: Record> {
    DropInserted(T::Id),
    Restore(usize, T),
    Nothing,
}

#[derive(Debug, Clone)]
pub struct EntityList<T: Record> {
    items: Vec<T>,
    order: Option<fn(&T, &T) -> Ordering>,
}

impl<T: Record> Default for EntityList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            order: None,
        }
    }
}

impl<T: Record> EntityList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, order: None }
    }

    /// Keeps the list sorted by `order` through every mutation, rollback included.
    pub fn ordered_by(mut self, order: fn(&T, &T) -> Ordering) -> Self {
        self.order = Some(order);
        self.resort();
        self
    }

    fn resort(&mut self) {
        if let Some(order) = self.order {
            self.items.sort_by(order);
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| &item.record_id() == id)
    }

    fn position(&self, id: &T::Id) -> Option<usize> {
        self.items.iter().position(|item| &item.record_id() == id)
    }

    /// Replaces the whole list, as after a full re-fetch.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
        self.resort();
    }

    pub fn apply(&mut self, mutation: Mutation<T>) -> Pending<T> {
        let undo = match mutation {
            Mutation::Insert(item) => {
                let id = item.record_id();
                self.items.push(item);
                Undo::DropInserted(id)
            }
            Mutation::Update(item) => match self.position(&item.record_id()) {
                Some(index) => {
                    let previous = std::mem::replace(&mut self.items[index], item);
                    Undo::Restore(index, previous)
                }
                None => Undo::Nothing,
            },
            Mutation::Remove(id) => match self.position(&id) {
                Some(index) => Undo::Restore(index, self.items.remove(index)),
                None => Undo::Nothing,
            },
        };
        self.resort();

        Pending { undo }
    }

    /// Swaps the optimistic copy for the backend's version of the row.
    pub fn reconcile(&mut self, pending: Pending<T>, confirmed: Option<T>) {
        let Some(confirmed) = confirmed else {
            return;
        };

        let placeholder = match &pending.undo {
            Undo::DropInserted(id) => Some(id.clone()),
            _ => Some(confirmed.record_id()),
        };

        match placeholder.and_then(|id| self.position(&id)) {
            Some(index) => self.items[index] = confirmed,
            None => debug!("confirmed row {:?} no longer listed", confirmed.record_id()),
        }
        self.resort();
    }

    pub fn rollback(&mut self, pending: Pending<T>) {
        match pending.undo {
            Undo::DropInserted(id) => {
                if let Some(index) = self.position(&id) {
                    self.items.remove(index);
                }
            }
            Undo::Restore(index, previous) => match self.position(&previous.record_id()) {
                Some(current) => self.items[current] = previous,
                None => {
                    let index = index.min(self.items.len());
                    self.items.insert(index, previous);
                }
            },
            Undo::Nothing => {}
        }
        self.resort();
    }
}

/// Applies `mutation`, awaits the backend call, then reconciles or rolls back.
pub async fn mutate<T, F>(list: &mut EntityList<T>, mutation: Mutation<T>, call: F) -> Result<Option<T>>
where
    T: Record,
    F: Future<Output = Result<Option<T>>>,
{
    let pending = list.apply(mutation);
    match call.await {
        Ok(confirmed) => {
            list.reconcile(pending, confirmed.clone());
            Ok(confirmed)
        }
        Err(e) => {
            list.rollback(pending);
            Err(e)
        }
    }
}
