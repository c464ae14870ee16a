// Audio output using cpal
// Handles cross-platform audio output with a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};
use std::sync::Arc;
use tracing::error;

use crate::error::{Error, Result};

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// One output stream, opened per track at the source's sample rate.
pub struct AudioOutput {
    stream: Stream,
    producer: Arc<Mutex<RingProducer>>,
    volume: Arc<Mutex<f32>>,
}

impl AudioOutput {
    /// Open the default output device at the given rate and channel count
    pub fn open(sample_rate: u32, channels: u16, volume: f32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("no output device available".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("failed to get output config: {}", e)))?;

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // ~250ms of audio at the requested rate
        let rb = HeapRb::<f32>::new((sample_rate as usize * channels as usize) / 4);
        let (producer, consumer) = rb.split();
        let producer = Arc::new(Mutex::new(producer));
        let consumer = Arc::new(Mutex::new(consumer));

        let volume = Arc::new(Mutex::new(volume.clamp(0.0, 1.0)));
        let volume_clone = volume.clone();

        // Build the output stream based on the device's sample format
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, consumer, volume_clone)?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, consumer, volume_clone)?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, consumer, volume_clone)?
            }
            format => {
                return Err(Error::AudioOutput(format!(
                    "unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("failed to start stream: {}", e)))?;

        Ok(Self {
            stream,
            producer,
            volume,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        consumer: Arc<Mutex<RingConsumer>>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Stream> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut consumer = consumer.lock();
                    let vol = *volume.lock();

                    for sample in data.iter_mut() {
                        let value = consumer.try_pop().unwrap_or(0.0) * vol;
                        *sample = T::from_sample(value);
                    }
                },
                move |err| {
                    error!("audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Write samples to the output buffer.
    /// Returns the number of samples actually written.
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut producer = self.producer.lock();
        let mut written = 0;

        for &sample in samples {
            if producer.try_push(sample).is_ok() {
                written += 1;
            } else {
                // Buffer full, drop remaining samples
                break;
            }
        }

        written
    }

    /// True once the device has consumed everything queued so far
    pub fn is_drained(&self) -> bool {
        self.producer.lock().occupied_len() == 0
    }

    /// Suspend the stream without tearing it down
    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::AudioOutput(format!("failed to pause stream: {}", e)))
    }

    /// Resume a paused stream
    pub fn resume(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("failed to resume stream: {}", e)))
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.volume.lock() = vol.clamp(0.0, 1.0);
    }
}
