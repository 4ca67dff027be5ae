use std::{
    collections::{hash_map::Entry, HashMap},
    path::PathBuf,
};

use coordinate_transformer::{reproject_bounds, CoordinateTransform, TransformerFactory};
use corridor_core::{crs::EpsgCode, geometry::Polygon};
use corridor_las::{CrsSource, PointCloudFile};

/// A candidate whose extent touches the corridor.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file: PointCloudFile,
    pub crs: EpsgCode,
    pub crs_source: CrsSource,
}

/// Keeps the candidates whose header extent, expressed in the corridor CRS,
/// intersects `corridor`. Unreadable files and files without a usable CRS are
/// logged and left out. Input order is preserved.
pub fn select_files(
    candidates: &[PathBuf],
    corridor: &Polygon,
    corridor_crs: EpsgCode,
    default_crs: Option<EpsgCode>,
    factory: &dyn TransformerFactory,
) -> Vec<SelectedFile> {
    let mut transformers: HashMap<EpsgCode, Box<dyn CoordinateTransform>> = HashMap::new();
    let mut selected = Vec::new();

    for path in candidates {
        let file = match PointCloudFile::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::error!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let name = file.file_name();

        if file.point_count == 0 {
            log::warn!("Skipping {}: file holds no points", name);
            continue;
        }

        let Some((crs, crs_source)) = file.resolve_crs(default_crs) else {
            log::error!("Skipping {}: no CRS in header and no default CRS", name);
            continue;
        };
        if crs_source == CrsSource::Default {
            log::warn!("{} has no CRS, assuming EPSG:{}", name, crs);
        }

        let transformer = match transformers.entry(crs) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match factory.create(crs, corridor_crs) {
                Ok(t) => entry.insert(t),
                Err(e) => {
                    log::error!("Skipping {}: {}", name, e);
                    continue;
                }
            },
        };

        let extent = match reproject_bounds(&file.planar_bounds(), transformer.as_mut()) {
            Ok(extent) => extent,
            Err(e) => {
                log::error!("Skipping {}: extent cannot be reprojected: {}", name, e);
                continue;
            }
        };

        if corridor.intersects_bounds(&extent) {
            log::debug!("Selected {}", file);
            selected.push(SelectedFile {
                file,
                crs,
                crs_source,
            });
        } else {
            log::debug!("{} does not intersect the corridor", name);
        }
    }

    log::info!(
        "{} of {} files intersect the corridor",
        selected.len(),
        candidates.len()
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinate_transformer::test_utils::TranslationFactory;
    use corridor_core::geometry::build_corridor;
    use corridor_las::test_utils::{las_point, write_las};

    fn tile(
        dir: &std::path::Path,
        name: &str,
        origin: [f64; 2],
        crs: Option<EpsgCode>,
    ) -> PathBuf {
        let path = dir.join(name);
        let [x, y] = origin;
        write_las(
            &path,
            &[las_point(x, y, 0.0, 2), las_point(x + 10.0, y + 10.0, 0.0, 2)],
            crs,
        );
        path
    }

    #[test]
    fn keeps_intersecting_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let near_end = tile(dir.path(), "c.las", [90.0, -5.0], Some(1));
        let far = tile(dir.path(), "far.las", [500.0, 500.0], Some(1));
        let near_start = tile(dir.path(), "a.las", [-15.0, -5.0], Some(1));
        let corrupt = dir.path().join("broken.las");
        std::fs::write(&corrupt, b"not a las file").unwrap();

        let corridor = build_corridor(0.0, 0.0, 100.0, 0.0, 10.0).unwrap();
        let factory = TranslationFactory::default();
        let selected = select_files(
            &[near_end.clone(), far, corrupt, near_start.clone()],
            &corridor,
            1,
            None,
            &factory,
        );

        let paths: Vec<_> = selected.iter().map(|s| s.file.path.clone()).collect();
        assert_eq!(paths, vec![near_end, near_start]);
    }

    #[test]
    fn touching_extent_counts() {
        let dir = tempfile::tempdir().unwrap();
        // extent [110, 120] x [0, 10] touches the extended end at x = 110
        let touching = tile(dir.path(), "touch.las", [110.0, 0.0], Some(1));
        let corridor = build_corridor(0.0, 0.0, 100.0, 0.0, 10.0).unwrap();
        let factory = TranslationFactory::default();
        let selected = select_files(&[touching], &corridor, 1, None, &factory);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn default_crs_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let untagged = tile(dir.path(), "untagged.las", [0.0, 0.0], None);
        let corridor = build_corridor(0.0, 0.0, 100.0, 0.0, 10.0).unwrap();
        let factory = TranslationFactory::default();

        assert!(select_files(&[untagged.clone()], &corridor, 1, None, &factory).is_empty());

        let selected = select_files(&[untagged], &corridor, 1, Some(1), &factory);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].crs_source, CrsSource::Default);
    }

    #[test]
    fn extent_is_compared_in_corridor_crs() {
        let dir = tempfile::tempdir().unwrap();
        // CRS 2 is CRS 1 shifted by +1000 in x
        let shifted = tile(dir.path(), "shifted.las", [1040.0, -5.0], Some(2));
        let unshifted = tile(dir.path(), "unshifted.las", [40.0, -5.0], Some(2));
        let factory = TranslationFactory::default()
            .with_crs(1, [0.0, 0.0])
            .with_crs(2, [1000.0, 0.0]);
        let corridor = build_corridor(0.0, 0.0, 100.0, 0.0, 10.0).unwrap();

        let selected = select_files(
            &[shifted.clone(), unshifted],
            &corridor,
            1,
            None,
            &factory,
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].file.path, shifted);
    }
}
