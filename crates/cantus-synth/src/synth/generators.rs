//! Per-channel generator overrides.

use crate::generator::GenParam;
use crate::voice::VoicePool;
use crate::Result;

use super::Synth;

impl<P: VoicePool> Synth<P> {
    /// Override a generator on `channel`.
    ///
    /// `absolute` replaces the SoundFont value, otherwise `value` is added
    /// to it. With `normalized`, `value` is 0-1 across the generator range.
    /// Sounding voices of the channel are updated.
    pub fn set_gen(
        &self,
        channel: usize,
        param: GenParam,
        value: f32,
        absolute: bool,
        normalized: bool,
    ) -> Result<()> {
        let value = if normalized {
            param.denormalize(value)
        } else {
            value
        };
        let mut state = self.channel(channel)?.lock();
        state.generators.set(param, value, absolute);
        self.update_generator_voices(channel, param, value, absolute);
        Ok(())
    }

    pub fn get_gen(&self, channel: usize, param: GenParam) -> Result<f32> {
        Ok(self.channel(channel)?.lock().generators.get(param))
    }

    /// Cached value and whether it is absolute, read together.
    pub fn gen_override(&self, channel: usize, param: GenParam) -> Result<(f32, bool)> {
        let state = self.channel(channel)?.lock();
        Ok((state.generators.get(param), state.generators.is_absolute(param)))
    }
}
