use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// X-y-width-height format, contains coordinates of the center of bbox and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Xywh;
impl BBoxFormat for Xywh {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> From<BBox<F>> for [f32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.0
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    // Use carefully when you REALLY sure that slice have needed format
    #[inline(always)]
    pub fn assigned(slice: &[f32; 4]) -> Self {
        BBox(*slice, PhantomData)
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox([x1, y1, x2, y2], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    /// Pixel area; degenerate boxes count as zero.
    #[inline]
    pub fn area(&self) -> f64 {
        let w = self.width().max(0.0) as f64;
        let h = self.height().max(0.0) as f64;

        w * h
    }

    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let i_left = self.left().max(other.left());
        let i_top = self.top().max(other.top());
        let i_right = self.right().min(other.right());
        let i_bottom = self.bottom().min(other.bottom());

        let i_area = (i_right - i_left).max(0.) * (i_bottom - i_top).max(0.);
        let union = self.area() as f32 + other.area() as f32 - i_area;

        if union <= 0.0 {
            0.0
        } else {
            i_area / union
        }
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl BBox<Xywh> {
    #[inline]
    pub fn xywh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Xywh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Xywh>) -> Self {
        let (w2, h2) = (v.0[2] / 2.0, v.0[3] / 2.0);

        Self(
            [v.0[0] - w2, v.0[1] - h2, v.0[0] + w2, v.0[1] + h2],
            PhantomData,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_of_ltrb() {
        let b = BBox::ltrb(10.0, 20.0, 40.0, 60.0);
        assert_eq!(b.area(), 1200.0);
    }

    #[test]
    fn degenerate_box_has_zero_area() {
        let b = BBox::ltrb(10.0, 20.0, 5.0, 60.0);
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn center_format_converts_to_corners() {
        let b = BBox::xywh(50.0, 50.0, 20.0, 10.0).as_ltrb();
        assert_eq!(b.as_slice(), &[40.0, 45.0, 60.0, 55.0]);
    }

    #[test]
    fn ltwh_round_trips_through_ltrb() {
        let b = BBox::ltwh(1.0, 2.0, 3.0, 4.0);
        assert_eq!(b.as_ltrb().as_ltwh(), b);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);

        let c = BBox::ltrb(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&c) - 1.0 / 3.0).abs() < 1e-6);
    }
}
