//! Raster element trait for generic cell values

use num_traits::NumCast;
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Elevation grids use `f64`, flow directions `u8`, basin labels `i32`
/// and catchment masks `bool`; all of them share the same [`Raster`]
/// container and metadata.
///
/// [`Raster`]: crate::raster::Raster
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + Send + Sync + 'static
{
    /// Value used to initialise freshly allocated grids
    fn zero() -> Self;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64>;
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn zero() -> Self {
                0
            }

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                false
            }

            fn to_f64(self) -> Option<f64> {
                NumCast::from(self)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn zero() -> Self {
                0.0
            }

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }

            fn to_f64(self) -> Option<f64> {
                NumCast::from(self)
            }
        }
    };
}

impl_raster_element_int!(i8);
impl_raster_element_int!(i16);
impl_raster_element_int!(i32);
impl_raster_element_int!(i64);
impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(u32);
impl_raster_element_int!(u64);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

/// Masks have no no-data state: a cell is either in or out.
impl RasterElement for bool {
    fn zero() -> Self {
        false
    }

    fn default_nodata() -> Self {
        false
    }

    fn is_nodata(&self, _nodata: Option<Self>) -> bool {
        false
    }

    fn is_float() -> bool {
        false
    }

    fn to_f64(self) -> Option<f64> {
        Some(if self { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_nodata_matches_sentinel_and_nan() {
        assert!(f64::NAN.is_nodata(None));
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!(-9998.0_f64).is_nodata(Some(-9999.0)));
        assert!(!1.0_f64.is_nodata(Some(f64::NAN)));
    }

    #[test]
    fn mask_values_are_never_nodata() {
        assert!(!true.is_nodata(Some(true)));
        assert_eq!(true.to_f64(), Some(1.0));
    }
}
