//! Keyed children diff.
//!
//! # Algorithm
//!
//! 1. Patch the common prefix, then the common suffix.
//! 2. If only new children remain, mount them before the first suffix node.
//!    If only old children remain, unmount them.
//! 3. Otherwise, for the unknown middle range: map new keys to positions,
//!    walk the old range patching matches and unmounting the rest, and record
//!    for every new position the old position it came from.
//! 4. If any match was out of order, keep the longest increasing run of old
//!    positions in place and move every other matched child. Walking the new
//!    range backwards lets each child use its already placed successor as the
//!    insertion anchor.

use std::collections::HashMap;

use tracing::debug;

use super::{longest_increasing_subsequence, Renderer};
use crate::error::Result;
use crate::host::{HostAdapter, HostNode};
use crate::vnode::{Key, VNode};

impl<A: HostAdapter + 'static> Renderer<A> {
    pub(super) fn patch_keyed_children(
        &self,
        c1: &[VNode],
        c2: &[VNode],
        container: HostNode,
        parent_anchor: Option<HostNode>,
    ) -> Result<()> {
        let mut i = 0;
        // Exclusive ends of the unprocessed ranges.
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        while i < e1 && i < e2 && c1[i].is_same_vnode(&c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, parent_anchor)?;
            i += 1;
        }

        while i < e1 && i < e2 && c1[e1 - 1].is_same_vnode(&c2[e2 - 1]) {
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, parent_anchor)?;
            e1 -= 1;
            e2 -= 1;
        }

        if i == e1 {
            let anchor = c2
                .get(e2)
                .and_then(|next| self.first_host_node(next))
                .or(parent_anchor);
            for child in &c2[i..e2] {
                self.patch(None, child, container, anchor)?;
            }
            return Ok(());
        }

        if i == e2 {
            for child in &c1[i..e1] {
                self.unmount(child, true);
            }
            return Ok(());
        }

        let start = i;
        // Later duplicates overwrite earlier ones.
        let key_to_new_index: HashMap<&Key, usize> = (start..e2)
            .filter_map(|index| c2[index].key().map(|key| (key, index)))
            .collect();

        let to_be_patched = e2 - start;
        // Old index + 1 for every new position; 0 means "mount".
        let mut source_index = vec![0usize; to_be_patched];
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_index_so_far = 0;
        let mut removals = 0usize;

        for (old_index, old) in c1.iter().enumerate().take(e1).skip(start) {
            if patched >= to_be_patched {
                self.unmount(old, true);
                removals += 1;
                continue;
            }

            let new_index = old
                .key()
                .and_then(|key| key_to_new_index.get(key).copied())
                .filter(|&index| source_index[index - start] == 0);

            let Some(new_index) = new_index else {
                self.unmount(old, true);
                removals += 1;
                continue;
            };

            if new_index >= max_new_index_so_far {
                max_new_index_so_far = new_index;
            } else {
                moved = true;
            }
            source_index[new_index - start] = old_index + 1;
            self.patch(Some(old), &c2[new_index], container, None)?;
            patched += 1;
        }

        let stable = if moved {
            longest_increasing_subsequence(&source_index)
        } else {
            Vec::new()
        };
        let mut cursor = stable.len();
        let mut moves = 0usize;
        let mut mounts = 0usize;

        for offset in (0..to_be_patched).rev() {
            let index = start + offset;
            let child = &c2[index];
            let anchor = c2
                .get(index + 1)
                .and_then(|next| self.first_host_node(next))
                .or(parent_anchor);

            if source_index[offset] == 0 {
                self.patch(None, child, container, anchor)?;
                mounts += 1;
            } else if moved {
                if cursor > 0 && stable[cursor - 1] == offset {
                    cursor -= 1;
                } else {
                    self.move_vnode(child, container, anchor);
                    moves += 1;
                }
            }
        }

        debug!(moves, mounts, removals, patched, "keyed children patched");
        Ok(())
    }
}
