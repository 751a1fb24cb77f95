use core::cmp::Ordering;

use crate::gpu::ResourceHandle;

use super::DrawUniforms;

/// Stable sort key for recorded draws.
///
/// Ordering rules:
/// 1) `texture`: ascending, untextured first (groups bind changes)
/// 2) `order`: ascending (insertion order for equal textures)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DrawKey {
    pub texture: Option<ResourceHandle>,
    pub order: u32,
}

impl Ord for DrawKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match self.texture.cmp(&other.texture) {
            Ordering::Equal => self.order.cmp(&other.order),
            o => o,
        }
    }
}

impl PartialOrd for DrawKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One indexed draw captured with the bind state current at record time.
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub key: DrawKey,
    pub vertex_buffer: ResourceHandle,
    pub index_buffer: ResourceHandle,
    pub base_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    pub uniforms: Box<DrawUniforms>,
}

/// Draws recorded for one eye pass.
///
/// `clear()` keeps capacity, so a warmed list does not allocate for its
/// index buffer.
#[derive(Debug, Default)]
pub struct EyeDrawList {
    items: Vec<RecordedDraw>,
    next_order: u32,
    sorted: Vec<usize>,
    sorted_dirty: bool,
}

impl EyeDrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.next_order = 0;
        self.sorted.clear();
        self.sorted_dirty = true;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[RecordedDraw] {
        &self.items
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        texture: Option<ResourceHandle>,
        vertex_buffer: ResourceHandle,
        index_buffer: ResourceHandle,
        base_index: u32,
        index_count: u32,
        base_vertex: i32,
        uniforms: DrawUniforms,
    ) {
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        self.items.push(RecordedDraw {
            key: DrawKey { texture, order },
            vertex_buffer,
            index_buffer,
            base_index,
            index_count,
            base_vertex,
            uniforms: Box::new(uniforms),
        });
        self.sorted_dirty = true;
    }

    /// Indices into [`items`](Self::items) in submission order.
    pub fn indices_in_submit_order(&mut self) -> &[usize] {
        if self.sorted_dirty {
            self.sorted.clear();
            self.sorted.extend(0..self.items.len());
            let items = &self.items;
            self.sorted.sort_by(|&a, &b| items[a].key.cmp(&items[b].key));
            self.sorted_dirty = false;
        }
        &self.sorted
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::render::MaterialParams;

    fn handle(raw: u64) -> ResourceHandle {
        ResourceHandle::from_raw(raw).unwrap()
    }

    fn push(list: &mut EyeDrawList, texture: Option<u64>, count: u32) {
        list.push(
            texture.map(handle),
            handle(100),
            handle(101),
            0,
            count,
            0,
            DrawUniforms::new(Mat4::IDENTITY, &MaterialParams::default(), &[]),
        );
    }

    #[test]
    fn groups_by_texture_keeping_insertion_order() {
        let mut list = EyeDrawList::new();
        push(&mut list, Some(2), 0);
        push(&mut list, None, 1);
        push(&mut list, Some(1), 2);
        push(&mut list, Some(2), 3);

        let order: Vec<u32> = list
            .indices_in_submit_order()
            .to_vec()
            .into_iter()
            .map(|i| list.items()[i].index_count)
            .collect();
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn clear_resets_ordering() {
        let mut list = EyeDrawList::new();
        push(&mut list, Some(1), 0);
        list.clear();
        assert!(list.is_empty());
        assert!(list.indices_in_submit_order().is_empty());

        push(&mut list, None, 5);
        assert_eq!(list.items()[0].key.order, 0);
    }
}
