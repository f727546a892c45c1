use super::ContactJoint;

/// Reorders joints so that wide lanes only ever touch disjoint bodies.
///
/// The output is a permutation of joint indices where every consecutive run of
/// `group_size_target` joints below the returned group offset references
/// pairwise-disjoint bodies. Inside such a run the Gauss–Seidel updates are
/// independent, which is what lets one SIMD iteration resolve the whole run.
/// Joints that can't be grouped are appended after the offset and solved one
/// by one.
///
/// Workspaces are kept across calls to avoid reallocation.
pub(crate) struct InteractionGroups {
    // Per-body tag of the group currently being filled; a body whose tag is
    // current already has a joint in the group.
    body_tags: Vec<u32>,
    // Joints not yet assigned to a group, compacted by swap-remove.
    ungrouped: Vec<u32>,
}

impl InteractionGroups {
    pub fn new() -> Self {
        Self {
            body_tags: Vec::new(),
            ungrouped: Vec::new(),
        }
    }

    /// Fills `joint_index` with the grouped permutation of `[0, joints.len())`
    /// and returns the size of the SIMD-safe prefix, always a multiple of
    /// `group_size_target`.
    ///
    /// The scan order is deterministic: candidates are visited in input order
    /// and removed by swap-remove, so identical inputs produce identical
    /// permutations.
    pub fn group_joints(
        &mut self,
        bodies_count: usize,
        joints: &[ContactJoint],
        joint_index: &mut Vec<u32>,
        group_size_target: usize,
    ) -> usize {
        let joint_count = joints.len();

        joint_index.clear();

        if group_size_target == 1 {
            joint_index.extend(0..joint_count as u32);
            return joint_count;
        }

        self.body_tags.clear();
        self.body_tags.resize(bodies_count, 0);

        self.ungrouped.clear();
        self.ungrouped.extend(0..joint_count as u32);

        let mut tag = 0u32;
        let mut group_offset = 0;

        while self.ungrouped.len() >= group_size_target {
            tag += 1;

            let mut group_size = 0;
            let mut i = 0;

            while i < self.ungrouped.len() && group_size < group_size_target {
                let candidate = self.ungrouped[i];
                let joint = &joints[candidate as usize];

                let body1 = joint.body1_index as usize;
                let body2 = joint.body2_index as usize;

                if self.body_tags[body1] < tag && self.body_tags[body2] < tag {
                    self.body_tags[body1] = tag;
                    self.body_tags[body2] = tag;

                    joint_index.push(candidate);
                    group_size += 1;

                    self.ungrouped.swap_remove(i);
                } else {
                    i += 1;
                }
            }

            group_offset += group_size;

            if group_size < group_size_target {
                break;
            }
        }

        // Whatever is left doesn't form a full group; it is solved one by one.
        joint_index.extend_from_slice(&self.ungrouped);
        debug_assert_eq!(joint_index.len(), joint_count);

        (group_offset / group_size_target) * group_size_target
    }
}
