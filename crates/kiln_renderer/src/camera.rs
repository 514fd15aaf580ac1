//! Cameras for primary ray generation.

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{Ray, Vec2, Vec3, Vec4};

use crate::scene::{CommitContext, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraType {
    Perspective,
    Orthographic,
}

/// Image plane spanned by `du` and `dv` from its lower-left corner. For a
/// perspective camera the corner is a direction, for an orthographic one a
/// position.
#[derive(Debug, Clone, Copy)]
enum Projection {
    Perspective { dir00: Vec3 },
    Orthographic { pos00: Vec3 },
}

/// Committed camera.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    position: Vec3,
    direction: Vec3,
    du: Vec3,
    dv: Vec3,
    projection: Projection,
    /// (xmin, ymin, xmax, ymax) of the image plane the frame covers.
    image_region: Vec4,
}

impl Camera {
    /// Perspective camera with `fovy` in radians.
    pub fn perspective(position: Vec3, direction: Vec3, up: Vec3, fovy: f32, aspect: f32) -> Option<Self> {
        let direction = direction.try_normalize()?;
        let height = 2.0 * (0.5 * fovy).tan();
        let du = direction.cross(up).try_normalize()? * height * aspect;
        let dv = du.cross(direction).try_normalize()? * height;
        Some(Camera {
            position,
            direction,
            du,
            dv,
            projection: Projection::Perspective { dir00: direction - 0.5 * du - 0.5 * dv },
            image_region: Vec4::new(0.0, 0.0, 1.0, 1.0),
        })
    }

    pub fn orthographic(position: Vec3, direction: Vec3, up: Vec3, height: f32, aspect: f32) -> Option<Self> {
        let direction = direction.try_normalize()?;
        let du = direction.cross(up).try_normalize()? * height * aspect;
        let dv = du.cross(direction).try_normalize()? * height;
        Some(Camera {
            position,
            direction,
            du,
            dv,
            projection: Projection::Orthographic { pos00: position - 0.5 * du - 0.5 * dv },
            image_region: Vec4::new(0.0, 0.0, 1.0, 1.0),
        })
    }

    pub fn with_image_region(mut self, region: Vec4) -> Self {
        self.image_region = region;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Ray through normalized screen coordinates, (0, 0) at the lower left.
    pub fn ray(&self, screen: Vec2) -> Ray {
        let lower = Vec2::new(self.image_region.x, self.image_region.y);
        let upper = Vec2::new(self.image_region.z, self.image_region.w);
        let s = lower + screen * (upper - lower);
        match self.projection {
            Projection::Perspective { dir00 } => {
                Ray::new(self.position, (dir00 + s.x * self.du + s.y * self.dv).normalize())
            }
            Projection::Orthographic { pos00 } => Ray::new(pos00 + s.x * self.du + s.y * self.dv, self.direction),
        }
    }
}

impl Entity for Camera {
    const KIND: ObjectType = ObjectType::Camera;
    const NAME: &'static str = "camera";

    type Subtype = CameraType;

    fn parse_subtype(name: &str) -> Option<CameraType> {
        match name {
            "perspective" => Some(CameraType::Perspective),
            "orthographic" => Some(CameraType::Orthographic),
            _ => None,
        }
    }

    fn build(
        subtype: CameraType,
        params: &ParameterStore,
        _cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let position = params.get_or("position", Vec3::ZERO);
        let direction = params.get_or("direction", Vec3::new(0.0, 0.0, -1.0));
        let up = params.get_or("up", Vec3::Y);
        let aspect = params.get_or("aspect", 1.0f32);

        let camera = match subtype {
            CameraType::Perspective => {
                let fovy = params.get_or("fovy", 60.0f32.to_radians());
                Camera::perspective(position, direction, up, fovy, aspect)
            }
            CameraType::Orthographic => {
                let height = params.get_or("height", 1.0f32);
                Camera::orthographic(position, direction, up, height, aspect)
            }
        };
        let camera = camera.ok_or_else(|| format!("degenerate basis: direction {direction}, up {up}"))?;
        Ok(camera.with_image_region(params.get_or("imageRegion", Vec4::new(0.0, 0.0, 1.0, 1.0))))
    }
}
