// tessera/renderer/src/allocator.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A quadtree-based texture atlas allocator.

use crate::gpu_data::{TextureLocation, TexturePageId};
use tessera_geometry::rect::RectI;
use tessera_geometry::vector::{Vector2F, Vector2I};

/// The side length of an atlas page. Images larger than this get their own
/// page.
pub const ATLAS_TEXTURE_LENGTH: u32 = 1024;

#[derive(Debug)]
pub struct TextureAllocator {
    pages: Vec<Option<TexturePage>>,
}

#[derive(Debug)]
struct TexturePage {
    allocator: TexturePageAllocator,
    is_new: bool,
}

#[derive(Debug)]
enum TexturePageAllocator {
    /// An atlas subdivided with a quadtree.
    Atlas(TextureAtlasAllocator),
    /// A single image.
    Image { size: Vector2I },
}

/// How a texture resource wants to be placed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AllocationMode {
    /// The resource may share an atlas page.
    Atlas,
    /// The resource requires a page of its own (e.g. a render target).
    OwnPage,
}

#[derive(Debug)]
pub struct TextureAtlasAllocator {
    root: TreeNode,
    size: u32,
}

#[derive(Debug)]
enum TreeNode {
    EmptyLeaf,
    FullLeaf,
    // Top left, top right, bottom left, and bottom right, in that order.
    Parent([Box<TreeNode>; 4]),
}

impl TextureAllocator {
    #[inline]
    pub fn new() -> TextureAllocator {
        TextureAllocator { pages: vec![] }
    }

    pub fn allocate(&mut self, requested_size: Vector2I, mode: AllocationMode)
                    -> TextureLocation {
        // If requested, or if the image is too big, use a separate page.
        if mode == AllocationMode::OwnPage ||
                requested_size.x > ATLAS_TEXTURE_LENGTH as i32 ||
                requested_size.y > ATLAS_TEXTURE_LENGTH as i32 {
            return self.allocate_image(requested_size);
        }

        // Try to add to each atlas.
        for (page_index, page) in self.pages.iter_mut().enumerate() {
            match *page {
                Some(TexturePage {
                    allocator: TexturePageAllocator::Atlas(ref mut allocator),
                    ..
                }) => {
                    if let Some(rect) = allocator.allocate(requested_size) {
                        return TextureLocation {
                            page: TexturePageId(page_index as u32),
                            rect,
                        };
                    }
                }
                _ => {}
            }
        }

        // Add a new atlas.
        let page = self.first_free_page_id();
        let mut allocator = TextureAtlasAllocator::new();
        let rect = allocator.allocate(requested_size).expect("Allocation failed!");
        self.place_page(page,
                        TexturePage {
                            allocator: TexturePageAllocator::Atlas(allocator),
                            is_new: true,
                        });
        TextureLocation { page, rect }
    }

    fn allocate_image(&mut self, requested_size: Vector2I) -> TextureLocation {
        let page = self.first_free_page_id();
        let rect = RectI::new(Vector2I::zero(), requested_size);
        self.place_page(page,
                        TexturePage {
                            allocator: TexturePageAllocator::Image { size: rect.size() },
                            is_new: true,
                        });
        TextureLocation { page, rect }
    }

    pub fn free(&mut self, location: TextureLocation) {
        match self.pages[location.page.0 as usize] {
            None => panic!("texture page is not allocated"),
            Some(TexturePage { allocator: TexturePageAllocator::Image { size }, .. }) => {
                debug_assert_eq!(location.rect, RectI::new(Vector2I::zero(), size));
            }
            Some(TexturePage {
                allocator: TexturePageAllocator::Atlas(ref mut allocator),
                ..
            }) => {
                allocator.free(location.rect);
                if !allocator.is_empty() {
                    // Other textures remain in the atlas; keep the page.
                    return;
                }
            }
        }
        self.pages[location.page.0 as usize] = None;
    }

    pub fn page_size(&self, page_id: TexturePageId) -> Vector2I {
        match self.pages[page_id.0 as usize] {
            None => panic!("no such texture page"),
            Some(TexturePage { allocator: TexturePageAllocator::Atlas(ref atlas), .. }) => {
                Vector2I::splat(atlas.size as i32)
            }
            Some(TexturePage { allocator: TexturePageAllocator::Image { size }, .. }) => size,
        }
    }

    pub fn page_scale(&self, page_id: TexturePageId) -> Vector2F {
        Vector2F::splat(1.0) / self.page_size(page_id).to_f32()
    }

    /// True if the page was created since the last
    /// `mark_all_pages_as_allocated` call, driving lazy GPU texture
    /// creation.
    pub fn page_is_new(&self, page_id: TexturePageId) -> bool {
        match self.pages[page_id.0 as usize] {
            None => panic!("no such texture page"),
            Some(ref page) => page.is_new,
        }
    }

    pub fn mark_all_pages_as_allocated(&mut self) {
        for page in &mut self.pages {
            if let Some(page) = page {
                page.is_new = false;
            }
        }
    }

    pub fn page_ids<'a>(&'a self) -> impl Iterator<Item = TexturePageId> + 'a {
        self.pages.iter().enumerate().filter_map(|(page_index, page)| {
            page.as_ref().map(|_| TexturePageId(page_index as u32))
        })
    }

    fn first_free_page_id(&self) -> TexturePageId {
        for (page_index, page) in self.pages.iter().enumerate() {
            if page.is_none() {
                return TexturePageId(page_index as u32);
            }
        }
        TexturePageId(self.pages.len() as u32)
    }

    fn place_page(&mut self, id: TexturePageId, page: TexturePage) {
        while id.0 as usize >= self.pages.len() {
            self.pages.push(None);
        }
        self.pages[id.0 as usize] = Some(page);
    }
}

impl TextureAtlasAllocator {
    #[inline]
    fn new() -> TextureAtlasAllocator {
        TextureAtlasAllocator::with_length(ATLAS_TEXTURE_LENGTH)
    }

    #[inline]
    fn with_length(length: u32) -> TextureAtlasAllocator {
        TextureAtlasAllocator { root: TreeNode::EmptyLeaf, size: length }
    }

    #[inline]
    fn allocate(&mut self, requested_size: Vector2I) -> Option<RectI> {
        let requested_length =
            (requested_size.x.max(requested_size.y) as u32).next_power_of_two();
        self.root.allocate(Vector2I::zero(), self.size, requested_length)
    }

    #[inline]
    fn free(&mut self, rect: RectI) {
        let requested_length = rect.width() as u32;
        self.root.free(Vector2I::zero(), self.size, rect.origin(), requested_length)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        match self.root {
            TreeNode::EmptyLeaf => true,
            _ => false,
        }
    }
}

impl TreeNode {
    // Invariant: `requested_size` must be a power of two.
    fn allocate(&mut self, this_origin: Vector2I, this_size: u32, requested_size: u32)
                -> Option<RectI> {
        if let TreeNode::FullLeaf = *self {
            // No room here.
            return None;
        }
        if this_size < requested_size {
            // Doesn't fit.
            return None;
        }

        // Allocate here or split, as necessary.
        if let TreeNode::EmptyLeaf = *self {
            // Do we have a perfect fit?
            if this_size == requested_size {
                *self = TreeNode::FullLeaf;
                return Some(RectI::new(this_origin, Vector2I::splat(this_size as i32)));
            }

            // Split.
            *self = TreeNode::Parent([
                Box::new(TreeNode::EmptyLeaf),
                Box::new(TreeNode::EmptyLeaf),
                Box::new(TreeNode::EmptyLeaf),
                Box::new(TreeNode::EmptyLeaf),
            ]);
        }

        // Recurse into children.
        match *self {
            TreeNode::Parent(ref mut kids) => {
                let kid_size = this_size / 2;
                if let Some(rect) = kids[0].allocate(this_origin, kid_size, requested_size) {
                    return Some(rect);
                }
                if let Some(rect) =
                        kids[1].allocate(this_origin + Vector2I::new(kid_size as i32, 0),
                                         kid_size,
                                         requested_size) {
                    return Some(rect);
                }
                if let Some(rect) =
                        kids[2].allocate(this_origin + Vector2I::new(0, kid_size as i32),
                                         kid_size,
                                         requested_size) {
                    return Some(rect);
                }
                if let Some(rect) =
                        kids[3].allocate(this_origin + Vector2I::splat(kid_size as i32),
                                         kid_size,
                                         requested_size) {
                    return Some(rect);
                }
                None
            }
            TreeNode::EmptyLeaf | TreeNode::FullLeaf => unreachable!(),
        }
    }

    fn free(&mut self,
            this_origin: Vector2I,
            this_size: u32,
            requested_origin: Vector2I,
            requested_size: u32) {
        if this_size <= requested_size {
            if this_size == requested_size && this_origin == requested_origin {
                *self = TreeNode::EmptyLeaf;
            }
            return;
        }

        let child_size = this_size / 2;
        let this_center = this_origin + Vector2I::splat(child_size as i32);

        let child_index;
        let mut child_origin = this_origin;
        if requested_origin.y < this_center.y {
            if requested_origin.x < this_center.x {
                child_index = 0;
            } else {
                child_index = 1;
                child_origin += Vector2I::new(child_size as i32, 0);
            }
        } else {
            if requested_origin.x < this_center.x {
                child_index = 2;
                child_origin += Vector2I::new(0, child_size as i32);
            } else {
                child_index = 3;
                child_origin = this_center;
            }
        }

        match *self {
            TreeNode::Parent(ref mut kids) => {
                kids[child_index].free(child_origin,
                                       child_size,
                                       requested_origin,
                                       requested_size);
                self.merge_if_necessary();
            }
            TreeNode::EmptyLeaf | TreeNode::FullLeaf => unreachable!(),
        }
    }

    fn merge_if_necessary(&mut self) {
        match *self {
            TreeNode::Parent(ref mut kids) => {
                if kids.iter().all(|kid| {
                    match **kid {
                        TreeNode::EmptyLeaf => true,
                        _ => false,
                    }
                }) {
                    *self = TreeNode::EmptyLeaf;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocationMode, TextureAllocator, TextureAtlasAllocator};
    use quickcheck;
    use tessera_geometry::vector::{Vector2I, vec2i};

    #[test]
    fn test_allocation_and_freeing() {
        quickcheck::quickcheck(prop_allocation_and_freeing_work as
                               fn(u32, Vec<(u32, u32)>) -> bool);

        fn prop_allocation_and_freeing_work(mut length: u32, mut sizes: Vec<(u32, u32)>)
                                            -> bool {
            length = u32::next_power_of_two(length).max(1);

            for &mut (ref mut width, ref mut height) in &mut sizes {
                *width = (*width).min(length).max(1);
                *height = (*height).min(length).max(1);
            }

            let mut allocator = TextureAtlasAllocator::with_length(length);
            let mut locations = vec![];
            for &(width, height) in &sizes {
                let size = Vector2I::new(width as i32, height as i32);
                if let Some(location) = allocator.allocate(size) {
                    locations.push(location);
                }
            }

            for location in locations {
                allocator.free(location);
            }

            assert!(allocator.is_empty());

            true
        }
    }

    #[test]
    fn test_large_image_gets_own_page() {
        let mut allocator = TextureAllocator::new();
        let atlas_loc = allocator.allocate(vec2i(64, 64), AllocationMode::Atlas);
        let image_loc = allocator.allocate(vec2i(2048, 128), AllocationMode::Atlas);
        assert_ne!(atlas_loc.page, image_loc.page);
        assert_eq!(allocator.page_size(image_loc.page), vec2i(2048, 128));
    }

    #[test]
    fn test_own_page_mode() {
        let mut allocator = TextureAllocator::new();
        let a = allocator.allocate(vec2i(16, 16), AllocationMode::OwnPage);
        let b = allocator.allocate(vec2i(16, 16), AllocationMode::OwnPage);
        assert_ne!(a.page, b.page);
    }

    #[test]
    fn test_page_is_new_tracking() {
        let mut allocator = TextureAllocator::new();
        let location = allocator.allocate(vec2i(4, 4), AllocationMode::Atlas);
        assert!(allocator.page_is_new(location.page));
        allocator.mark_all_pages_as_allocated();
        assert!(!allocator.page_is_new(location.page));
    }

    #[test]
    fn test_freeing_page_releases_it() {
        let mut allocator = TextureAllocator::new();
        let location = allocator.allocate(vec2i(32, 32), AllocationMode::OwnPage);
        allocator.free(location);
        let location2 = allocator.allocate(vec2i(8, 8), AllocationMode::OwnPage);
        assert_eq!(location.page, location2.page);
    }
}
