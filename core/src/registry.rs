use filter_deck_common::config::Config;

use crate::filter::background::BackgroundFilter;
use crate::filter::blur::Blur;
use crate::filter::contours::MeanColorContours;
use crate::filter::corners::Harris;
use crate::filter::edges::{Axis, Canny, Gradient, Laplacian};
use crate::filter::equalize::Equalize;
use crate::filter::features::{Orb, Patented, StarBrief};
use crate::filter::motion::MotionDiff;
use crate::filter::optflow::{FlowParams, OpticalFlowFilter};
use crate::filter::skin::SkinMask;
use crate::filter::threshold::AdaptiveThreshold;
use crate::filter::traits::{Transform, Unchanged};

/// One registry slot: a display name, the transform it runs and a
/// human-readable description for titles.
pub struct FilterDescriptor {
    pub name: String,
    pub transform: Box<dyn Transform>,
    pub description: String,
}

impl std::fmt::Debug for FilterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered filter table. Insertion order defines next/previous cycling.
/// Built once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    filters: Vec<FilterDescriptor>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full demo deck, parameterised by `config`.
    pub fn standard(config: &Config) -> Self {
        let flow = FlowParams::from_config(&config.optical_flow);
        let mut registry = Self::new();
        registry.register("Unchanged", Unchanged, "Unchanged original image");
        registry.register("Canny", Canny::default(), "Canny edge detection");
        registry.register("Threshold", AdaptiveThreshold::default(), "Adaptive Gaussian threshold");
        registry.register("Harris", Harris::default(), "Harris corner detection");
        registry.register(
            "SIFT",
            Patented { algorithm: "SIFT" },
            "Scale-Invariant Feature Transform (SIFT), patented",
        );
        registry.register(
            "SURF",
            Patented { algorithm: "SURF" },
            "Speeded-Up Robust Features (SURF), patented",
        );
        registry.register("ORB", Orb::default(), "Oriented FAST and Rotated BRIEF (ORB), free");
        registry.register(
            "BRIEF",
            StarBrief::default(),
            "BRIEF descriptors with the help of CenSurE (STAR) detector",
        );
        registry.register(
            "Contours",
            MeanColorContours::default(),
            "Draw contours with mean colors inside them",
        );
        registry.register(
            "Blur",
            Blur::new(&config.blur),
            "Blur (Gaussian, median, bilateral or classic)",
        );
        registry.register("Motion", MotionDiff, "Motion detection");
        registry.register(
            "Background",
            BackgroundFilter::new(&config.background),
            "Background subtractor (KNN, MOG2, MOG or GMG)",
        );
        registry.register("Skin", SkinMask::default(), "Skin tones detection");
        registry.register("Optical Flow", OpticalFlowFilter::new(&flow), "Lucas Kanade optical flow");
        registry.register("Equalize", Equalize, "Histogram equalization");
        registry.register("Laplacian", Laplacian, "Laplacian gradient filter");
        registry.register("Sobel X", Gradient { axis: Axis::X }, "Scharr vertical gradient filter");
        registry.register("Sobel Y", Gradient { axis: Axis::Y }, "Scharr horizontal gradient filter");
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        transform: impl Transform + 'static,
        description: impl Into<String>,
    ) {
        self.filters.push(FilterDescriptor {
            name: name.into(),
            transform: Box::new(transform),
            description: description.into(),
        });
    }

    pub fn count(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Name and description of slot `index`.
    ///
    /// # Panics
    /// If `index >= count()`. Indices only come from the session's own
    /// cycling arithmetic, so a bad one is a bug.
    pub fn describe(&self, index: usize) -> (&str, &str) {
        let d = self.get(index);
        (&d.name, &d.description)
    }

    /// # Panics
    /// If `index >= count()`.
    pub fn get(&self, index: usize) -> &FilterDescriptor {
        &self.filters[index]
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|d| d.name.as_str()).collect()
    }

    /// Index of the first filter called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.filters.iter().position(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterDescriptor> {
        self.filters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_order() {
        let registry = FilterRegistry::standard(&Config::default());
        assert_eq!(registry.count(), 18);
        assert_eq!(
            registry.names(),
            vec![
                "Unchanged",
                "Canny",
                "Threshold",
                "Harris",
                "SIFT",
                "SURF",
                "ORB",
                "BRIEF",
                "Contours",
                "Blur",
                "Motion",
                "Background",
                "Skin",
                "Optical Flow",
                "Equalize",
                "Laplacian",
                "Sobel X",
                "Sobel Y",
            ]
        );
        assert_eq!(registry.describe(13), ("Optical Flow", "Lucas Kanade optical flow"));
    }

    #[test]
    fn register_appends_in_order() {
        let mut registry = FilterRegistry::new();
        assert!(registry.is_empty());
        registry.register("a", Unchanged, "first");
        registry.register("b", MotionDiff, "second");
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.describe(1), ("b", "second"));
        assert_eq!(registry.position("a"), Some(0));
        assert_eq!(registry.position("missing"), None);
    }

    #[test]
    fn only_patented_filters_are_unavailable() {
        let registry = FilterRegistry::standard(&Config::default());
        let unavailable: Vec<&str> = registry
            .iter()
            .filter(|d| d.transform.availability().is_err())
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(unavailable, vec!["SIFT", "SURF"]);
    }

    #[test]
    #[should_panic]
    fn describe_out_of_range_panics() {
        FilterRegistry::new().describe(0);
    }
}
