use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use pedra_core::PedraError;
use std::{collections::HashMap, path::Path};

/// Deep copy of the trainable parameters of a network.
///
/// Tensors are ordered by parameter name. A snapshot never shares storage
/// with the variables it was taken from, so training the network afterwards
/// leaves the snapshot untouched.
#[derive(Debug, Clone)]
pub struct ParameterVector {
    tensors: Vec<(String, Tensor)>,
}

fn lock_error<T>(_: T) -> PedraError {
    PedraError::Lock("parameters of the network".to_string())
}

impl ParameterVector {
    /// Builds a vector from named tensors.
    pub fn from_named(tensors: impl IntoIterator<Item = (String, Tensor)>) -> Self {
        let mut tensors = tensors.into_iter().collect::<Vec<_>>();
        tensors.sort_by(|(a, _), (b, _)| a.cmp(b));
        Self { tensors }
    }

    /// Copies the variables of `varmap`.
    pub fn copy_from(varmap: &VarMap) -> Result<Self> {
        let data = varmap.data().lock().map_err(lock_error)?;
        let tensors = data
            .iter()
            .map(|(k, v)| -> Result<(String, Tensor)> { Ok((k.clone(), v.as_tensor().copy()?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_named(tensors))
    }

    /// Overwrites the variables of `varmap`.
    ///
    /// Names and shapes are checked for every variable before the first
    /// write, so on error `varmap` is left unchanged.
    pub fn copy_to(&self, varmap: &VarMap) -> Result<()> {
        let data = varmap.data().lock().map_err(lock_error)?;

        for (name, var) in data.iter() {
            match self.get(name) {
                None => {
                    return Err(PedraError::ParameterShapeMismatch {
                        name: name.clone(),
                        expected: format!("{:?}", var.dims()),
                        got: "missing".to_string(),
                    }
                    .into())
                }
                Some(t) if t.dims() != var.dims() => {
                    return Err(PedraError::ParameterShapeMismatch {
                        name: name.clone(),
                        expected: format!("{:?}", var.dims()),
                        got: format!("{:?}", t.dims()),
                    }
                    .into())
                }
                Some(_) => {}
            }
        }
        if let Some((name, t)) = self.tensors.iter().find(|(k, _)| !data.contains_key(k)) {
            return Err(PedraError::ParameterShapeMismatch {
                name: name.clone(),
                expected: "absent".to_string(),
                got: format!("{:?}", t.dims()),
            }
            .into());
        }

        let converted = data
            .iter()
            .filter_map(|(name, var)| self.get(name).map(|t| (var, t)))
            .map(|(var, t)| -> Result<_> {
                Ok((var, t.to_dtype(var.dtype())?.to_device(var.device())?))
            })
            .collect::<Result<Vec<_>>>()?;
        for (var, t) in converted {
            var.set(&t)?;
        }

        Ok(())
    }

    /// Returns the tensor of the parameter `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors
            .binary_search_by(|(k, _)| k.as_str().cmp(name))
            .ok()
            .map(|i| &self.tensors[i].1)
    }

    /// Iterates over the parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(k, t)| (k.as_str(), t))
    }

    /// Number of parameter tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns `true` if the vector holds no tensor.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Checks that `other` has the same names and shapes in the same order.
    ///
    /// Returns a description of the first difference.
    pub fn check_layout(&self, other: &ParameterVector) -> Result<(), String> {
        if self.len() != other.len() {
            return Err(format!("{} tensors vs {} tensors", self.len(), other.len()));
        }
        for ((k1, t1), (k2, t2)) in self.iter().zip(other.iter()) {
            if k1 != k2 {
                return Err(format!("tensor {} vs tensor {}", k1, k2));
            }
            if t1.dims() != t2.dims() {
                return Err(format!("{}: {:?} vs {:?}", k1, t1.dims(), t2.dims()));
            }
        }
        Ok(())
    }

    /// Saves the tensors as a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let tensors = self
            .tensors
            .iter()
            .cloned()
            .collect::<HashMap<String, Tensor>>();
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Loads tensors from a safetensors file.
    pub fn load<T: AsRef<Path>>(path: T, device: &Device) -> Result<Self> {
        let tensors = candle_core::safetensors::load(path, device)?;
        Ok(Self::from_named(tensors))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;
    use tempdir::TempDir;

    fn varmap(shapes: &[(&str, usize)]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        for (name, n) in shapes {
            vm.get((*n,), name, init, DType::F32, &Device::Cpu)?;
        }
        Ok(vm)
    }

    fn values(pv: &ParameterVector, name: &str) -> Vec<f32> {
        pv.get(name).unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn test_snapshot_does_not_alias() -> Result<()> {
        let vm = varmap(&[("b", 3), ("a", 2)])?;
        let pv = ParameterVector::copy_from(&vm)?;
        assert_eq!(pv.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "b"]);
        let before = values(&pv, "a");

        let t = Tensor::new(&[7f32, 8.], &Device::Cpu)?;
        vm.data().lock().unwrap().get("a").unwrap().set(&t)?;
        assert_eq!(values(&pv, "a"), before);
        Ok(())
    }

    #[test]
    fn test_copy_to() -> Result<()> {
        let src = varmap(&[("a", 2), ("b", 3)])?;
        let dest = varmap(&[("a", 2), ("b", 3)])?;
        let pv = ParameterVector::copy_from(&src)?;
        pv.copy_to(&dest)?;
        let pv_ = ParameterVector::copy_from(&dest)?;
        assert_eq!(values(&pv, "a"), values(&pv_, "a"));
        assert_eq!(values(&pv, "b"), values(&pv_, "b"));
        Ok(())
    }

    #[test]
    fn test_copy_to_rejects_other_layouts() -> Result<()> {
        let dest = varmap(&[("a", 2), ("b", 3)])?;
        let before = ParameterVector::copy_from(&dest)?;

        for shapes in [
            vec![("a", 2), ("b", 4)],
            vec![("a", 2)],
            vec![("a", 2), ("b", 3), ("c", 1)],
        ]
        .iter()
        {
            let pv = ParameterVector::copy_from(&varmap(shapes)?)?;
            let err = pv.copy_to(&dest).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PedraError>(),
                Some(PedraError::ParameterShapeMismatch { .. })
            ));
        }

        let after = ParameterVector::copy_from(&dest)?;
        assert_eq!(values(&before, "a"), values(&after, "a"));
        assert_eq!(values(&before, "b"), values(&after, "b"));
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let pv = ParameterVector::copy_from(&varmap(&[("a", 2), ("b", 3)])?)?;
        let dir = TempDir::new("parameter_vector")?;
        let path = dir.path().join("params.safetensors");
        pv.save(&path)?;
        let pv_ = ParameterVector::load(&path, &Device::Cpu)?;
        assert!(pv.check_layout(&pv_).is_ok());
        assert_eq!(values(&pv, "b"), values(&pv_, "b"));
        Ok(())
    }
}
