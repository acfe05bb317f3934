//! Gnomonic (TAN) world coordinate system.
//!
//! Built from the `wcs` header astrometry.net returns. Pixel coordinates on
//! the Rust side are 0-based; the header reference pixel is 1-based (FITS).
use nalgebra::{Matrix2, Vector2};

use crate::{
    constants::{Degree, Pixel, RADEG},
    exarata_errors::ExarataError,
    fits::{FitsHeader, HeaderValue},
};

#[derive(Debug, Clone, PartialEq)]
pub struct TanWcs {
    /// Reference pixel, 1-based.
    crpix: Vector2<f64>,
    /// Sky coordinates of the reference pixel, degrees.
    crval: Vector2<f64>,
    /// Pixel to intermediate world coordinates, degrees per pixel.
    cd: Matrix2<f64>,
    cd_inverse: Matrix2<f64>,
}

impl TanWcs {
    /// Arguments
    /// -----------------
    /// * `crpix`: reference pixel (1-based, FITS convention).
    /// * `crval`: (ra, dec) of the reference pixel in degrees.
    /// * `cd`: the CD matrix, degrees per pixel.
    ///
    /// Return
    /// ----------
    /// * The WCS, or [`ExarataError::Input`] if the CD matrix is singular.
    pub fn new(crpix: [f64; 2], crval: [Degree; 2], cd: Matrix2<f64>) -> Result<Self, ExarataError> {
        let cd_inverse = cd
            .try_inverse()
            .ok_or_else(|| ExarataError::Input("The WCS CD matrix is singular".into()))?;
        Ok(TanWcs {
            crpix: Vector2::from(crpix),
            crval: Vector2::from(crval),
            cd,
            cd_inverse,
        })
    }

    /// Read a TAN WCS from header cards.
    ///
    /// Uses `CD1_1..CD2_2` when present, otherwise `CDELT1/2` with the
    /// optional rotation `CROTA2` (degrees).
    pub fn from_header(header: &FitsHeader) -> Result<Self, ExarataError> {
        if let Some(ctype) = header.get_string("CTYPE1") {
            if !ctype.contains("TAN") {
                return Err(ExarataError::Input(format!(
                    "Only gnomonic (TAN) projections are handled, the header has `{ctype}`"
                )));
            }
        }
        let crpix = [header.require_f64("CRPIX1")?, header.require_f64("CRPIX2")?];
        let crval = [header.require_f64("CRVAL1")?, header.require_f64("CRVAL2")?];

        let cd = match (
            header.get_f64("CD1_1"),
            header.get_f64("CD1_2"),
            header.get_f64("CD2_1"),
            header.get_f64("CD2_2"),
        ) {
            (Some(cd11), Some(cd12), Some(cd21), Some(cd22)) => Matrix2::new(cd11, cd12, cd21, cd22),
            _ => {
                let cdelt1 = header.require_f64("CDELT1")?;
                let cdelt2 = header.require_f64("CDELT2")?;
                let (sin, cos) = (header.get_f64("CROTA2").unwrap_or(0.0) * RADEG).sin_cos();
                Matrix2::new(cdelt1 * cos, -cdelt2 * sin, cdelt1 * sin, cdelt2 * cos)
            }
        };
        TanWcs::new(crpix, crval, cd)
    }

    /// The header cards of this WCS, always in the CD matrix form.
    pub fn to_header(&self) -> FitsHeader {
        let mut header = FitsHeader::new();
        header.insert("WCSAXES", HeaderValue::Number(2.0));
        header.insert("CTYPE1", HeaderValue::Text("RA---TAN".into()));
        header.insert("CTYPE2", HeaderValue::Text("DEC--TAN".into()));
        for (key, value) in [
            ("CRPIX1", self.crpix.x),
            ("CRPIX2", self.crpix.y),
            ("CRVAL1", self.crval.x),
            ("CRVAL2", self.crval.y),
            ("CD1_1", self.cd[(0, 0)]),
            ("CD1_2", self.cd[(0, 1)]),
            ("CD2_1", self.cd[(1, 0)]),
            ("CD2_2", self.cd[(1, 1)]),
        ] {
            header.insert(key, HeaderValue::Number(value));
        }
        header
    }

    /// Sky coordinates (ra, dec) in degrees of a 0-based pixel position.
    pub fn pixel_to_sky(&self, x: Pixel, y: Pixel) -> (Degree, Degree) {
        let offset = Vector2::new(x + 1.0, y + 1.0) - self.crpix;
        let intermediate = self.cd * offset * RADEG;
        let (xi, eta) = (intermediate.x, intermediate.y);

        let ra0 = self.crval.x * RADEG;
        let dec0 = self.crval.y * RADEG;
        let denominator = dec0.cos() - eta * dec0.sin();
        let ra = ra0 + xi.atan2(denominator);
        let dec = (dec0.sin() + eta * dec0.cos()).atan2(xi.hypot(denominator));

        ((ra / RADEG).rem_euclid(360.0), dec / RADEG)
    }

    /// 0-based pixel position of sky coordinates in degrees.
    ///
    /// Points on the far hemisphere from the reference have no gnomonic
    /// projection; NaN is returned for them.
    pub fn sky_to_pixel(&self, ra: Degree, dec: Degree) -> (Pixel, Pixel) {
        let ra0 = self.crval.x * RADEG;
        let dec0 = self.crval.y * RADEG;
        let (ra, dec) = (ra * RADEG, dec * RADEG);
        let delta_ra = ra - ra0;

        let cos_c = dec0.sin() * dec.sin() + dec0.cos() * dec.cos() * delta_ra.cos();
        if cos_c <= 0.0 {
            return (f64::NAN, f64::NAN);
        }
        let xi = dec.cos() * delta_ra.sin() / cos_c;
        let eta = (dec0.cos() * dec.sin() - dec0.sin() * dec.cos() * delta_ra.cos()) / cos_c;

        let offset = self.cd_inverse * Vector2::new(xi, eta) / RADEG;
        let pixel = offset + self.crpix;
        (pixel.x - 1.0, pixel.y - 1.0)
    }

    /// Sky coordinates of the reference pixel, degrees.
    pub fn reference_sky(&self) -> (Degree, Degree) {
        (self.crval.x, self.crval.y)
    }

    /// Mean pixel scale, arcseconds per pixel.
    pub fn pixel_scale(&self) -> f64 {
        self.cd.determinant().abs().sqrt() * 3600.0
    }
}
