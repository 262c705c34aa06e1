// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Disjoint sets over dense integer ids

use ena::unify::{InPlaceUnificationTable, UnifyKey};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
struct IntKey(u32);

impl UnifyKey for IntKey {
    type Value = ();
    fn index(&self) -> u32 {
        self.0
    }
    fn from_index(u: u32) -> IntKey {
        IntKey(u)
    }
    fn tag() -> &'static str {
        "IntKey"
    }
}

/// Union-find over the ids `0..len`
pub struct DisjointSets {
    table: InPlaceUnificationTable<IntKey>,
    len: usize,
}

impl DisjointSets {
    pub fn new(len: usize) -> Self {
        let mut table = InPlaceUnificationTable::new();
        for _ in 0..len {
            table.new_key(());
        }
        Self { table, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn union(&mut self, a: usize, b: usize) {
        self.table.union(IntKey(a as u32), IntKey(b as u32));
    }

    pub fn find(&mut self, a: usize) -> usize {
        self.table.find(IntKey(a as u32)).0 as usize
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.table.unioned(IntKey(a as u32), IntKey(b as u32))
    }

    /// Compact set label of every id, numbered by first appearance
    pub fn labels(&mut self) -> Vec<usize> {
        let mut root_label = vec![usize::MAX; self.len];
        let mut next = 0;
        (0..self.len)
            .map(|id| {
                let root = self.find(id);
                if root_label[root] == usize::MAX {
                    root_label[root] = next;
                    next += 1;
                }
                root_label[root]
            })
            .collect()
    }
}
