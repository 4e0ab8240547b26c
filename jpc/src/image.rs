// An "image area" is defined on the reference grid by the dimensional
// parameters, (Xsiz, Ysiz) and (XOsiz, YOsiz).
//
// Specifically, the image area on the reference grid is defined by its upper
// left hand reference grid point at location (XOsiz, YOsiz), and its lower
// right hand reference grid point at location (Xsiz-1, Ysiz-1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    /// XOsiz: horizontal offset of the image area.
    pub x0: u32,
    /// YOsiz: vertical offset of the image area.
    pub y0: u32,
    /// Xsiz: width of the reference grid.
    pub x1: u32,
    /// Ysiz: height of the reference grid.
    pub y1: u32,
    pub components: Vec<ImageComponent>,
}

// The samples of component c are at integer multiples of (XRsiz^c, YRsiz^c)
// on the reference grid, so the component occupies
//
// x0 = [XOsiz / XRsiz^c], x1 = [Xsiz / XRsiz^c]
// y0 = [YOsiz / YRsiz^c], y1 = [Ysiz / YRsiz^c]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageComponent {
    /// XRsiz: horizontal separation with respect to the reference grid.
    pub dx: u32,
    /// YRsiz: vertical separation with respect to the reference grid.
    pub dy: u32,
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
    /// Bit depth of the samples, 1 to 38.
    pub precision: u32,
    pub signed: bool,
    /// Number of resolutions removed when decoding.
    pub factor: u32,
    /// Samples written by the tile-coding engine; empty until then.
    pub data: Vec<i32>,
}

impl Image {
    pub fn no_components(&self) -> usize {
        self.components.len()
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Recomputes every component's extent from the image area.
    pub(crate) fn update_component_geometry(&mut self) {
        let (x0, y0, x1, y1) = (self.x0, self.y0, self.x1, self.y1);
        for component in &mut self.components {
            component.x0 = ceil_div(x0, component.dx);
            component.y0 = ceil_div(y0, component.dy);
            component.width = ceil_div(x1, component.dx) - component.x0;
            component.height = ceil_div(y1, component.dy) - component.y0;
        }
    }
}

pub(crate) fn ceil_div(a: u32, b: u32) -> u32 {
    ((a as u64 + b as u64 - 1) / b as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_geometry() {
        let mut image = Image {
            x0: 1,
            y0: 0,
            x1: 10,
            y1: 7,
            components: vec![
                ImageComponent {
                    dx: 1,
                    dy: 1,
                    ..Default::default()
                },
                ImageComponent {
                    dx: 2,
                    dy: 2,
                    ..Default::default()
                },
            ],
        };
        image.update_component_geometry();
        assert_eq!(image.components[0].width, 9);
        assert_eq!(image.components[0].height, 7);
        assert_eq!(image.components[1].x0, 1);
        assert_eq!(image.components[1].width, 4);
        assert_eq!(image.components[1].height, 4);
    }
}
