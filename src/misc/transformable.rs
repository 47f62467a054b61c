/// Objects whose coefficients can be mapped by a transformation of type `T`.
///
/// Dimensions are only known at runtime, so a transformation whose shape
/// does not fit the object is reported as an error instead of a panic.
pub trait Transformable<T>: Clone {
    fn try_transform(&mut self, transform: T) -> anyhow::Result<()>;

    fn try_transformed(&self, transform: T) -> anyhow::Result<Self> {
        let mut clone = self.clone();
        clone.try_transform(transform)?;
        Ok(clone)
    }
}
